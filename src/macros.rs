//! Leveled emission through the process-wide registry.
//!
//! ```
//! use chatlog::{fields, info, warning};
//!
//! info!("session {} opened", "abc");
//! warning!(fields: fields! { "session" => "abc", "retries" => 2 }, "completion slow");
//! ```
//!
//! Structured metadata is only ever taken from the explicit `fields:`
//! argument, never from the positional arguments.

#[macro_export]
macro_rules! log {
    ($level:expr, fields: $fields:expr, $($arg:tt)+) => {
        $crate::registry::__log(
            $level,
            ::std::option::Option::Some($fields),
            ::std::format_args!($($arg)+),
        )
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::registry::__log($level, ::std::option::Option::None, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    (fields: $fields:expr, $($arg:tt)+) => {
        $crate::log!($crate::Level::Debug, fields: $fields, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    (fields: $fields:expr, $($arg:tt)+) => {
        $crate::log!($crate::Level::Info, fields: $fields, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    (fields: $fields:expr, $($arg:tt)+) => {
        $crate::log!($crate::Level::Warning, fields: $fields, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    (fields: $fields:expr, $($arg:tt)+) => {
        $crate::log!($crate::Level::Error, fields: $fields, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::log!($crate::Level::Error, $($arg)+)
    };
}

/// Logs synchronously, drains pending records and exits the process with status 1.
#[macro_export]
macro_rules! fatal {
    (fields: $fields:expr, $($arg:tt)+) => {
        $crate::registry::__fatal(
            ::std::option::Option::Some($fields),
            ::std::format_args!($($arg)+),
        )
    };
    ($($arg:tt)+) => {
        $crate::registry::__fatal(::std::option::Option::None, ::std::format_args!($($arg)+))
    };
}
