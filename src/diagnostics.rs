//! Error and warning accounting.
//!
//! Diagnostics are logged through the `log` facade and counted here. Every
//! report names the input source and either the current line number or, once
//! a message is being parsed, the line its message started on. The full
//! message text is logged once per message; repeats refer back with a
//! "logged above" line.
//!
//! Exceeding the configured maximum error count surfaces as
//! [Error::MaxErrorsExceeded]; the run loop stops and the CLI maps it to
//! exit code -2.

use crate::errors::Error;

#[derive(Debug)]
pub struct Diagnostics {
    input_name: String,
    line_number: usize,
    message_location: usize,
    message: Option<String>,
    raw_message: Option<String>,
    previous_raw_message: Option<String>,
    last_message_with_error: Option<String>,
    last_message_with_warning: Option<String>,
    max_error_count: u32,
    error_count: u32,
    warning_count: u32,
    messages_with_error_count: u32,
    messages_with_warning_count: u32,
}

impl Diagnostics {
    pub fn new(max_error_count: u32) -> Self {
        Self {
            input_name: "<stdin>".to_string(),
            line_number: 0,
            message_location: 0,
            message: None,
            raw_message: None,
            previous_raw_message: None,
            last_message_with_error: None,
            last_message_with_warning: None,
            max_error_count,
            error_count: 0,
            warning_count: 0,
            messages_with_error_count: 0,
            messages_with_warning_count: 0,
        }
    }

    /// Adopt a SHEFPARM-supplied limit after the overlay loads.
    pub(crate) fn set_max_error_count(&mut self, max_error_count: u32) {
        self.max_error_count = max_error_count;
    }

    pub(crate) fn set_input_name(&mut self, name: &str) {
        self.input_name = name.to_string();
        self.line_number = 0;
    }

    pub(crate) fn set_line_number(&mut self, line_number: usize) {
        self.line_number = line_number;
    }

    /// Attach the message being parsed; subsequent reports carry its
    /// starting line and log its text once.
    pub(crate) fn set_message(&mut self, location: usize, raw: &str, text: &str) {
        self.message_location = location;
        self.raw_message = Some(raw.to_string());
        self.message = Some(text.to_string());
    }

    pub(crate) fn clear_message(&mut self) {
        self.raw_message = None;
        self.message = None;
    }

    fn located(&self, text: &str) -> String {
        if self.raw_message.is_some() {
            format!(
                "{} in message starting at {}:{}",
                text, self.input_name, self.message_location
            )
        } else {
            format!("{} at {}:{}", text, self.input_name, self.line_number)
        }
    }

    /// Log the offending message once; repeats point at the earlier copy.
    fn log_message_context(&mut self, kind: &str) {
        if let Some(raw) = &self.raw_message {
            if self.previous_raw_message.as_deref() != Some(raw.as_str()) {
                log::info!("{} is in message :\n\t{}", kind, raw.replace('\n', "\n\t"));
            } else {
                log::info!("{} is in message logged above", kind);
            }
            self.previous_raw_message = Some(raw.clone());
        }
    }

    pub(crate) fn info(&self, text: &str) {
        log::info!("{}", self.located(text));
    }

    pub(crate) fn warning(&mut self, text: &str) {
        log::warn!("{}", self.located(text));
        self.log_message_context("Warning");
        self.warning_count += 1;
        if self.message != self.last_message_with_warning {
            self.messages_with_warning_count += 1;
            self.last_message_with_warning = self.message.clone();
        }
    }

    pub(crate) fn error(&mut self, text: &str) -> Result<(), Error> {
        log::error!("{}", self.located(text));
        self.log_message_context("Error");
        self.error_count += 1;
        if self.message != self.last_message_with_error {
            self.messages_with_error_count += 1;
            self.last_message_with_error = self.message.clone();
        }
        if self.error_count > self.max_error_count {
            log::error!(
                "Maximum number of errors ({}) exceeded - aborting",
                self.max_error_count
            );
            return Err(Error::MaxErrorsExceeded(self.max_error_count));
        }
        Ok(())
    }

    pub(crate) fn critical(&mut self, text: &str) {
        log::error!("{}, aborting parser", self.located(text));
        self.log_message_context("Critical error");
        self.error_count += 1;
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn messages_with_errors(&self) -> u32 {
        self.messages_with_error_count
    }

    pub fn messages_with_warnings(&self) -> u32 {
        self.messages_with_warning_count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_limit_aborts_on_excess() {
        let mut diag = Diagnostics::new(3);
        for i in 0..3 {
            assert!(diag.error(&format!("error {}", i)).is_ok());
        }
        // the (N+1)th error trips the limit, never before
        assert!(matches!(
            diag.error("one too many"),
            Err(Error::MaxErrorsExceeded(3))
        ));
        assert_eq!(diag.error_count(), 4);
    }

    #[test]
    fn distinct_message_counting() {
        let mut diag = Diagnostics::new(100);
        diag.set_message(1, ".A X 0501 Z DH12/HG 1.0", ".A X 0501 Z DH12/HG 1.0");
        diag.error("first").unwrap();
        diag.error("second in same message").unwrap();
        diag.set_message(2, ".A Y 0501 Z DH12/HG 1.0", ".A Y 0501 Z DH12/HG 1.0");
        diag.error("third in new message").unwrap();
        assert_eq!(diag.error_count(), 3);
        assert_eq!(diag.messages_with_errors(), 2);

        diag.warning("warn");
        diag.warning("warn again");
        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.messages_with_warnings(), 1);
    }
}
