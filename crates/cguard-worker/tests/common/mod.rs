//! Collaborator fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use cguard_clients::{ClientError, ClientResult, Moderator, Transcriber};
use cguard_models::{ModerationDetail, ModerationRequest, ModerationVerdict, Transcription};

/// Echoes the clip bytes back as text, optionally failing every call.
#[derive(Default)]
pub struct FakeTranscriber {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        _mime_hint: &str,
        _language_hint: Option<&str>,
    ) -> ClientResult<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::InvalidResponse("stt exploded".into()));
        }
        Ok(Transcription {
            text: String::from_utf8_lossy(audio).into_owned(),
            confidence: 0.9,
            language: Some("en".into()),
        })
    }
}

#[derive(Default)]
pub struct FakeModerator {
    pub reject: bool,
    pub fail: bool,
    pub requests: Mutex<Vec<ModerationRequest>>,
}

impl FakeModerator {
    pub fn last_request(&self) -> Option<ModerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Moderator for FakeModerator {
    async fn moderate(&self, request: &ModerationRequest) -> ClientResult<ModerationVerdict> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(ClientError::ServiceUnavailable {
                service: "moderation",
                message: "down".into(),
            });
        }
        Ok(ModerationVerdict {
            approved: !self.reject,
            detail: ModerationDetail {
                reason: self.reject.then(|| "policy".to_string()),
                ..Default::default()
            },
        })
    }
}

impl FakeTranscriber {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
