//! Construction macros for [`Value`](crate::Value) literals.

/// Builds a `Value::Array` from a list of expressions convertible
/// into `Value`.
///
/// ```
/// let cmd = bser::array!["clock", "/repo"];
/// ```
#[macro_export]
macro_rules! array {
    ($($item:expr),* $(,)?) => {
        $crate::Value::Array(vec![$($crate::Value::from($item)),*])
    };
}

/// Builds a `Value::Object` from `key => value` pairs.
///
/// ```
/// let query = bser::object! { "fields" => bser::array!["name"] };
/// ```
#[macro_export]
macro_rules! object {
    ($($key:expr => $val:expr),* $(,)?) => {{
        let mut entries = ::std::collections::BTreeMap::new();
        $(entries.insert(::std::string::String::from($key), $crate::Value::from($val));)*
        $crate::Value::Object(entries)
    }};
}
