use std::process::{Child, Command, Stdio};

use client::media::Speaker;
use parking_lot::Mutex;
use tracing::warn;

/// Speaks through an external TTS program (`espeak`, `say`, ...). A new
/// utterance is ignored while the previous one is still playing.
pub struct CommandSpeaker {
    program: String,
    child: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: Mutex::new(None),
        }
    }

    /// `say` on macOS, `espeak` elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("say")
        } else {
            Self::new("espeak")
        }
    }

    fn is_speaking(child: &mut Option<Child>) -> bool {
        match child {
            Some(c) => matches!(c.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) {
        let mut child = self.child.lock();
        if Self::is_speaking(&mut child) {
            return;
        }
        match Command::new(&self.program)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => *child = Some(c),
            Err(e) => warn!("Could not start {}: {e}", self.program),
        }
    }

    fn stop(&self) {
        let mut child = self.child.lock();
        if Self::is_speaking(&mut child) {
            if let Some(c) = child.as_mut() {
                let _ = c.kill();
                let _ = c.wait();
            }
        }
        *child = None;
    }
}
