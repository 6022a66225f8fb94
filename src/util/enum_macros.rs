/// Generates a Rust enum with a custom range of values, including variants
/// for named values, custom values within a specified range, and reserved
/// values outside that range.
///
/// BACnet enumerations reserve a numeric band for vendor extension (object
/// types from 128, property identifiers from 512, error codes from 256).
/// This macro generates the named standard variants plus a `Custom` variant
/// covering the vendor band and a `Reserved` variant for unnamed standard
/// values, so conversion from the wire value is total and decoding never
/// fails on an unrecognized number.
///
/// # Arguments
///
/// * `$name:ident` - The name of the enum to be generated.
/// * `$variant:ident = $value:expr` - A comma-separated list of named enum
///   variants and their corresponding integer values.
/// * `$unit:ident` - The underlying integer type for the enum (e.g., `u8`,
///   `u16`, `u32`).
/// * `$range:expr` - The vendor-extension range (e.g., `512..=4194303`).
///   Values within this range that are not explicitly named variants are
///   represented by the `Custom` variant; unnamed values outside it by
///   `Reserved`.
///
/// # Example
///
/// ```rust
/// use bacnet_codec::generate_custom_enum;
///
/// generate_custom_enum! {
///     MyEnum {
///         VariantA = 1,
///         VariantB = 2,
///         VariantC = 100,
///     },
///     u16,
///     1000..=2000
/// }
///
/// let a = MyEnum::VariantA;
/// let custom_val = MyEnum::from(1500u16);
/// let reserved_val = MyEnum::from(3000u16);
///
/// assert_eq!(u16::from(a), 1);
/// assert_eq!(format!("{}", a), "VariantA");
/// if let MyEnum::Custom(value) = custom_val {
///     assert_eq!(value.value(), 1500);
/// } else {
///     panic!("Expected MyEnum::Custom");
/// }
/// if let MyEnum::Reserved(value) = reserved_val {
///     assert_eq!(value.value(), 3000);
/// } else {
///     panic!("Expected MyEnum::Reserved");
/// }
/// assert_eq!(MyEnum::from(100u16), MyEnum::VariantC);
/// ```
///
/// # Generated Code Structure
///
/// The macro generates an enum with the named variants plus
/// `Custom([<$name Value>])` and `Reserved([<$name Value>])`, and implements
/// `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`,
/// `core::fmt::Display`, and the `From` conversions in both directions.
#[macro_export]
macro_rules! generate_custom_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $value:expr,)+ }, $unit:ident, $custom_range:expr) => {
        pastey::paste! {
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
            pub enum $name {
                $($variant,)*
                Custom( [<$name Value>] ),
                Reserved( [<$name Value>] ),
            }

            #[doc = concat!("Numeric value wrapper for unnamed `", stringify!($name), "` values")]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
            pub struct [<$name Value>] { value: $unit }

            impl [<$name Value>] {
                fn new(value: $unit) -> Self {
                    Self { value }
                }

                pub fn value(&self) -> $unit {
                    self.value
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    match self {
                        $($name::$variant => write!(f, "{}", stringify!($variant)),)*
                        $name::Custom( value ) => write!(f, "Custom({})", value.value()),
                        $name::Reserved( value ) => write!(f, "Reserved({})", value.value()),
                    }
                }
            }

            impl From<$name> for $unit {
                fn from(value: $name) -> Self {
                    match value {
                        $($name::$variant => $value,)*
                        $name::Custom( value ) => value.value(),
                        $name::Reserved( value ) => value.value(),
                    }
                }
            }

            impl From<$unit> for $name {
                fn from(value: $unit) -> Self {
                    match value {
                        $($value => $name::$variant,)*
                        v if !($custom_range).contains(&v) => {
                            $name::Reserved( [<$name Value>]::new(v) )
                        }
                        v if ($custom_range).contains(&v) => {
                            $name::Custom( [<$name Value>]::new(v) )
                        }
                        _ => unreachable!(),
                    }
                }
            }
        }
    };
}
