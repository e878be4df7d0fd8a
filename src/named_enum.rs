/// Declares a fieldless enum that is persisted by variant name.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(field: &'static str, value: &str) -> Result<Self, crate::error::DecodeError> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == value)
                    .ok_or_else(|| crate::error::DecodeError::UnknownEnumValue {
                        field,
                        value: value.to_string(),
                    })
            }
        }
    };
}
