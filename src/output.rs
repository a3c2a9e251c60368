use std::path::{Path, PathBuf};

use crate::decode::DecodedResponse;

/// What [`emit_response`] did with a response.
#[derive(Debug, PartialEq, Eq)]
pub enum Emitted {
    /// The response was blank.
    Nothing,
    Logged,
    Saved(PathBuf),
}

/// Logs the decoded response and, when `output` is set, writes it there.
///
/// Blank responses are skipped entirely. A file that cannot be written only
/// produces a warning; the response has already been logged by then.
pub fn emit_response(response: &DecodedResponse, output: Option<&Path>) -> Emitted {
    if response.is_blank() {
        tracing::debug!("function returned a blank response");
        return Emitted::Nothing;
    }

    tracing::info!("LAMBDA RESPONSE:\n{}", response.text());

    let Some(path) = output.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty()) else {
        return Emitted::Logged;
    };
    match std::fs::write(path, response.as_bytes()) {
        Ok(()) => {
            print_success(&format!("Response written to {}", path.display()));
            Emitted::Saved(path.to_path_buf())
        }
        Err(e) => {
            tracing::warn!(
                "Error occurred when creating the output file provided: [{}]",
                e
            );
            Emitted::Logged
        }
    }
}

pub fn print_success(msg: &str) {
    use colored::Colorize;
    println!("{}", msg.green());
}

pub fn print_error(msg: &str) {
    use colored::Colorize;
    eprintln!("{}", msg.red());
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;

    /// Log lines written by the subscriber installed with [`capture_logs`].
    #[derive(Clone, Default)]
    pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Routes this thread's logs into a buffer until the guard is dropped.
    pub(crate) fn capture_logs() -> (LogBuffer, DefaultGuard) {
        let buf = LogBuffer::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (buf, tracing::subscriber::set_default(subscriber))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::capture_logs;
    use super::*;
    use crate::decode::decode_response;

    #[test]
    fn saves_the_decoded_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let response = decode_response(b"aGVsbG8gd29ybGQ=").unwrap();

        assert_eq!(
            emit_response(&response, Some(&path)),
            Emitted::Saved(path.clone())
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn overwrites_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "a much longer previous response").unwrap();
        let response = decode_response(b"aGk=").unwrap();

        emit_response(&response, Some(&path));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
    }

    #[test]
    fn blank_responses_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let response = decode_response(b"ICAKCQ==").unwrap();

        assert_eq!(emit_response(&response, Some(&path)), Emitted::Nothing);
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_output_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.txt");
        let response = decode_response(b"aGk=").unwrap();

        assert_eq!(emit_response(&response, Some(&path)), Emitted::Logged);
        assert!(!path.exists());
    }

    #[test]
    fn without_output_path_only_logs() {
        let (logs, _guard) = capture_logs();
        let response = decode_response(b"aGk=").unwrap();
        assert_eq!(emit_response(&response, None), Emitted::Logged);
        assert!(logs.contents().contains("LAMBDA RESPONSE:\nhi"));
    }

    #[test]
    fn blank_responses_are_not_logged() {
        let (logs, _guard) = capture_logs();
        let response = decode_response(b"ICAKCQ==").unwrap();
        emit_response(&response, None);
        assert!(!logs.contents().contains("LAMBDA RESPONSE"));
    }
}
