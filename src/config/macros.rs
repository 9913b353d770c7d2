/// Configuration macros for single-declaration config structs
///
/// `config_struct!` defines a struct with public fields and embedded
/// defaults, and derives serde support with `#[serde(default)]` so a TOML
/// file only needs to name the values it overrides.
///
/// ```ignore
/// config_struct! {
///     pub struct UpdatesConfig {
///         url: String = "ws://localhost:8080".to_string(),
///         max_reconnect_attempts: u32 = 5,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
