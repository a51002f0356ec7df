//! One-record-per-call output helper
//!
//! Embedded newlines are escaped so a single call can never spill into
//! several records.

use std::io::{self, Write};

/// Replace every `\n` with the two characters `\` `n`
pub fn escape_newlines(message: &str) -> String {
    message.replace('\n', "\\n")
}

/// Write `message` (escaped) and a newline, then flush
pub fn write_message<W: Write + ?Sized>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "{}", escape_newlines(message))?;
    out.flush()
}

/// Concatenate the `Display` of every argument and print it as one line
///
/// Evaluates to the `io::Result<()>` of the write. A leading `to out;` writes
/// to `out` instead of standard output.
///
/// ```no_run
/// # fn main() -> std::io::Result<()> {
/// servertee::log_line!("loaded ", 3, " graphs")?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! log_line {
    (to $out:expr; $($arg:expr),* $(,)?) => {{
        let mut message = ::std::string::String::new();
        $(
            message.push_str(&::std::string::ToString::to_string(&$arg));
        )*
        $crate::helper::write_message(&mut $out, &message)
    }};
    ($($arg:expr),* $(,)?) => {
        $crate::log_line!(to ::std::io::stdout(); $($arg),*)
    };
}
