/// Declares a trimmed, non-empty text newtype.
///
/// Deserializing runs the same validation as `new`, so a value of the type
/// is always valid.
macro_rules! text_field {
    ($(#[$meta:meta])* $name:ident, field = $field:literal, max_chars = $max_chars:expr) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(text: &str) -> Result<Self, $crate::model::InvalidTextError> {
                $crate::util::trimmed_text(text, $max_chars)
                    .map(Self)
                    .map_err(|error| $crate::model::InvalidTextError {
                        field: $field,
                        error,
                    })
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::model::InvalidTextError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let inner = String::deserialize(deserializer)?;
                Self::new(&inner).map_err(serde::de::Error::custom)
            }
        }
    };
}
