use std::process::ExitCode;

/// Outcome of a command: a status and an optional closing message for
/// stderr.
#[derive(Debug)]
pub struct Exit {
    success: bool,
    message: Option<String>,
}

impl Exit {
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn error() -> Self {
        Self {
            success: false,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn report(self) -> ExitCode {
        if let Some(message) = self.message {
            eprintln!("{message}");
        }
        if self.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}
