pub mod adapter;
pub mod http;
pub mod synthesizer;

pub use adapter::{RetryPolicy, SynthesisAdapter, SynthesisStats, TurnStats};
pub use http::{HttpSynthesizer, ServiceHealth};
pub use synthesizer::{
    MockFailure, MockSynthesizer, SpeechSynthesizer, SynthesisRequest, SynthesizedSpeech,
};
