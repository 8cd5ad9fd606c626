//! Structured log helpers.
//!
//! Port events carry consistent fields so they can be filtered downstream:
//! - `port_id`: the port the event concerns
//! - `kind`: the wire target of the port (`direct`, `superportGroup`, ...)
//! - additional context fields

/// Log a port-related event with standard fields.
///
/// ```rust,ignore
/// log_port_event!(info, "port created", port_id, "superportDirect", limit = 5);
/// ```
#[macro_export]
macro_rules! log_port_event {
    ($level:ident, $msg:expr, $port_id:expr, $kind:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            port_id = %$port_id,
            kind = %$kind,
            $($($field)*,)?
            concat!("[portline] ", $msg)
        )
    };
}

/// Log a connection-related event with standard fields.
#[macro_export]
macro_rules! log_line_event {
    ($level:ident, $msg:expr, $line_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            line_id = %$line_id,
            $($($field)*,)?
            concat!("[portline] ", $msg)
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_without_subscriber() {
        let port_id = "p".repeat(32);
        log_port_event!(info, "port created", port_id, "direct");
        log_port_event!(debug, "port paused", port_id, "superportDirect", limit = 5u32);
        log_line_event!(warn, "line retired", "line-1", reason = "duplicate");
    }
}
