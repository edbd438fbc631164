/// Receives one human-readable message per file started and per
/// warning, skip or error.
///
/// Presentation is the caller's concern: a console printer, a log, or a
/// channel feeding another thread all fit behind this one method.
pub trait Report {
	fn report(&mut self, message: &str);
}

impl<F> Report for F
where
	F: FnMut(&str),
{
	fn report(&mut self, message: &str) {
		self(message);
	}
}

/// Collects every message, mostly useful in tests and for callers that want
/// to render messages after the run.
#[derive(Debug, Default, Clone)]
pub struct CollectedReport {
	pub messages: Vec<String>,
}

impl Report for CollectedReport {
	fn report(&mut self, message: &str) {
		self.messages.push(message.to_string());
	}
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReport;

impl Report for SilentReport {
	fn report(&mut self, _message: &str) {}
}
