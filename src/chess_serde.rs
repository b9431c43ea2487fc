pub mod square_serde {
    use std::str::FromStr;

    use serde::{
        de::{Error, Visitor},
        Deserializer, Serializer,
    };
    use shakmaty::Square;

    pub fn serialize<S: Serializer>(sq: &Square, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&sq.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Square, D::Error> {
        struct SquareVisitor {}
        impl<'de> Visitor<'de> for SquareVisitor {
            type Value = Square;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a square in algebraic notation, like e4")
            }
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Square::from_str(v).map_err(|_| Error::custom(format!("invalid square {v:?}")))
            }
        }
        d.deserialize_str(SquareVisitor {})
    }
}

pub mod option_square_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Square;

    pub fn serialize<S: Serializer>(sq: &Option<Square>, ser: S) -> Result<S::Ok, S::Error> {
        match sq {
            Some(sq) => ser.serialize_some(&sq.to_string()),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Square>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|v| {
                v.parse()
                    .map_err(|_| serde::de::Error::custom(format!("invalid square {v:?}")))
            })
            .transpose()
    }
}

/// A promotion piece as its lowercase UCI letter, or null.
pub mod promotion_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Role;

    pub fn serialize<S: Serializer>(role: &Option<Role>, ser: S) -> Result<S::Ok, S::Error> {
        match role {
            Some(role) => ser.serialize_some(&role.char().to_string()),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Role>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|v| super::role_from_str(&v).map_err(serde::de::Error::custom))
            .transpose()
    }
}

pub mod role_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Role;

    pub fn serialize<S: Serializer>(role: &Role, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&role.char().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Role, D::Error> {
        let v = String::deserialize(d)?;
        super::role_from_str(&v).map_err(serde::de::Error::custom)
    }
}

pub mod color_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(color: &Color, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(match color {
            Color::White => "white",
            Color::Black => "black",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
        match String::deserialize(d)?.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Color::White),
            "black" | "b" => Ok(Color::Black),
            other => Err(serde::de::Error::custom(format!("invalid side {other:?}"))),
        }
    }
}

/// Accepts either the piece letter (`q`) or its name (`queen`), any case.
fn role_from_str(v: &str) -> Result<shakmaty::Role, String> {
    use shakmaty::Role;

    let lower = v.to_ascii_lowercase();
    let role = match lower.as_str() {
        "pawn" => Some(Role::Pawn),
        "knight" => Some(Role::Knight),
        "bishop" => Some(Role::Bishop),
        "rook" => Some(Role::Rook),
        "queen" => Some(Role::Queen),
        "king" => Some(Role::King),
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Role::from_char(c),
                _ => None,
            }
        }
    };
    role.ok_or_else(|| format!("invalid piece {v:?}"))
}
