//! End-to-end episode production against a mock synthesis service.
//!
//! Run with: cargo test --test pipeline_e2e

use podgen::audio::buffer::AudioBuffer;
use podgen::audio::wav::encode_wav;
use podgen::config::Config;
use podgen::episode::{EpisodeInputs, ResponseInput, SegmentKind};
use podgen::error::ErrorKind;
use podgen::pipeline::{
    EpisodePipeline, EpisodeReport, EpisodeRequest, RecordingObserver, Stage, process_queue,
};
use podgen::synthesis::{MockFailure, MockSynthesizer, RetryPolicy, SynthesisAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Duration tolerance for resampled segments, in seconds.
const TOLERANCE: f64 = 0.05;

fn write_tone(dir: &Path, name: &str, seconds: f64, sample_rate: u32, hz: f64) -> PathBuf {
    let frames = (seconds * sample_rate as f64).round() as usize;
    let samples = (0..frames)
        .map(|i| (2.0 * std::f64::consts::PI * hz * i as f64 / sample_rate as f64).sin() as f32 * 0.3)
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, encode_wav(&AudioBuffer::new(samples, sample_rate, 1)).unwrap()).unwrap();
    path
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

fn pipeline_with(config: Config, mock: MockSynthesizer) -> EpisodePipeline<MockSynthesizer> {
    let adapter = SynthesisAdapter::new(mock, fast_retries(), config.synthesis.speed);
    EpisodePipeline::new(config, MockSynthesizer::new()).with_adapter(adapter)
}

fn request(dir: &Path, prompt: PathBuf, response: Option<ResponseInput>) -> EpisodeRequest {
    EpisodeRequest {
        name: "episode".to_string(),
        inputs: EpisodeInputs::new(prompt, response),
        output_path: dir.join("out").join("episode.wav"),
    }
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "{what}: expected {expected:.3}s, got {actual:.3}s"
    );
}

fn span(report: &EpisodeReport, kind: SegmentKind) -> (f64, f64) {
    let span = report
        .segments
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or_else(|| panic!("no {kind} span"));
    (span.start_secs, span.duration_secs)
}

#[tokio::test]
async fn full_episode_has_every_segment_in_order() {
    let dir = TempDir::new().unwrap();
    let intro = write_tone(dir.path(), "intro.wav", 5.0, 48000, 440.0);
    let outro = write_tone(dir.path(), "outro.wav", 2.0, 22050, 330.0);
    let prompt = write_tone(dir.path(), "prompt.wav", 4.0, 44100, 200.0);

    let mut config = Config::default();
    config.episode.intro_jingle = Some(intro);
    config.episode.outro_jingle = Some(outro);
    config.episode.pause_duration_secs = 1.0;

    let mock = MockSynthesizer::new().with_speech_duration(Duration::from_secs(5));
    let pipeline = pipeline_with(config, mock);
    let req = request(
        dir.path(),
        prompt,
        Some(ResponseInput::Text("Tide pools are busier than they look.".to_string())),
    );

    let report = pipeline.run(&req).await.unwrap();

    let kinds: Vec<SegmentKind> = report.segments.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, SegmentKind::CANONICAL.to_vec());

    assert_close(span(&report, SegmentKind::IntroJingle).0, 0.0, "intro start");
    assert_close(span(&report, SegmentKind::PromptVoice).0, 5.0, "prompt start");
    assert_close(span(&report, SegmentKind::Pause).0, 9.0, "pause start");
    assert_close(span(&report, SegmentKind::Pause).1, 1.0, "pause length");
    assert_close(span(&report, SegmentKind::ResponseVoice).0, 10.0, "response start");
    assert_close(span(&report, SegmentKind::ResponseVoice).1, 5.0, "response length");
    assert_close(span(&report, SegmentKind::OutroJingle).0, 15.0, "outro start");
    assert_close(report.episode.total_duration_secs, 17.0, "total");

    let reader = hound::WavReader::open(&report.episode.audio_path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(
        report.episode.file_size_bytes,
        std::fs::metadata(&report.episode.audio_path).unwrap().len()
    );
}

#[tokio::test]
async fn silent_prompt_pause_and_tone_response_sum_up() {
    let dir = TempDir::new().unwrap();
    let prompt = dir.path().join("silence.wav");
    std::fs::write(
        &prompt,
        encode_wav(&AudioBuffer::silence(Duration::from_secs(10), 44100, 1)).unwrap(),
    )
    .unwrap();
    let mut config = Config::default();
    config.episode.pause_duration_secs = 2.0;
    let mock = MockSynthesizer::new().with_speech_duration(Duration::from_secs(5));
    let pipeline = pipeline_with(config, mock);

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Tone".to_string()))))
        .await
        .unwrap();

    assert_close(report.episode.total_duration_secs, 17.0, "total");
    let summed: f64 = report.segments.iter().map(|s| s.duration_secs).sum();
    assert_close(summed, report.episode.total_duration_secs, "sum of spans");
}

#[tokio::test]
async fn episode_is_normalized_to_target_loudness() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 3.0, 44100, 200.0);
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Hello".to_string()))))
        .await
        .unwrap();

    assert_eq!(report.episode.normalization_target_lufs, -16.0);
    assert!(report.episode.measured_loudness_lufs.is_some());

    let mut reader = hound::WavReader::open(&report.episode.audio_path).unwrap();
    let peak = reader
        .samples::<i16>()
        .map(|s| (s.unwrap() as f32 / i16::MAX as f32).abs())
        .fold(0.0f32, f32::max);
    // -1 dBFS ceiling
    assert!(peak <= 0.8913 + 1e-3, "peak {peak}");
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let mock = MockSynthesizer::new().with_failures([MockFailure::Timeout, MockFailure::Unavailable]);
    let pipeline = pipeline_with(Config::default(), mock);

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string()))))
        .await
        .unwrap();

    assert_eq!(report.synthesis.attempts, 3);
    assert_eq!(pipeline.adapter().synthesizer().calls(), 3);
    assert_eq!(report.stages.last(), Some(&Stage::Done));
}

#[tokio::test]
async fn exhausted_retries_fail_while_synthesizing() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let mock = MockSynthesizer::new().with_failures([MockFailure::Timeout; 4]);
    let pipeline = pipeline_with(Config::default(), mock);
    let req = request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string())));

    let err = pipeline.run(&req).await.unwrap_err();

    assert_eq!(err.stage, Stage::Synthesizing);
    assert_eq!(err.kind(), ErrorKind::SynthesisTimeout);
    assert_eq!(pipeline.adapter().synthesizer().calls(), 4);
    assert!(!req.output_path.exists());
}

#[tokio::test]
async fn rejected_text_is_not_retried_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let observer = Arc::new(RecordingObserver::new());
    let pipeline = pipeline_with(
        Config::default(),
        MockSynthesizer::new().with_failure(MockFailure::Rejected),
    )
    .with_observer(observer.clone());
    let req = request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string())));

    let err = pipeline.run(&req).await.unwrap_err();

    assert_eq!(err.stage, Stage::Synthesizing);
    assert_eq!(err.kind(), ErrorKind::SynthesisRejected);
    assert_eq!(pipeline.adapter().synthesizer().calls(), 1);
    assert_eq!(
        observer.stages(),
        vec![Stage::Collecting, Stage::Synthesizing, Stage::Failed]
    );
    assert!(!req.output_path.exists());
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn missing_prompt_fails_before_any_synthesis() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let req = request(
        dir.path(),
        dir.path().join("nope.mp3"),
        Some(ResponseInput::Text("Hi".to_string())),
    );

    let err = pipeline.run(&req).await.unwrap_err();

    assert_eq!(err.stage, Stage::Collecting);
    assert_eq!(err.kind(), ErrorKind::MissingInput);
    assert!(err.to_string().contains("nope.mp3"), "{err}");
    assert_eq!(pipeline.adapter().synthesizer().calls(), 0);
}

#[tokio::test]
async fn missing_jingle_fails_while_collecting() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let mut config = Config::default();
    config.episode.outro_jingle = Some(dir.path().join("gone.mp3"));
    let pipeline = pipeline_with(config, MockSynthesizer::new());

    let err = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string()))))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Collecting);
    assert_eq!(err.kind(), ErrorKind::MissingInput);
}

#[tokio::test]
async fn blank_response_is_an_empty_plan() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let req = request(dir.path(), prompt, Some(ResponseInput::Text("   ".to_string())));

    let err = pipeline.run(&req).await.unwrap_err();

    assert_eq!(err.stage, Stage::Assembling);
    assert_eq!(err.kind(), ErrorKind::EmptyPlan);
    assert_eq!(pipeline.adapter().synthesizer().calls(), 0);
    assert!(!req.output_path.exists());
}

#[tokio::test]
async fn zero_pause_and_no_jingles_gives_two_segments() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 2.0, 16000, 200.0);
    let mut config = Config::default();
    config.episode.pause_duration_secs = 0.0;
    let pipeline = pipeline_with(config, MockSynthesizer::new());

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string()))))
        .await
        .unwrap();

    let kinds: Vec<SegmentKind> = report.segments.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SegmentKind::PromptVoice, SegmentKind::ResponseVoice]);
    assert_close(span(&report, SegmentKind::ResponseVoice).0, 2.0, "response start");
    assert_close(report.episode.total_duration_secs, 3.0, "total");
}

#[tokio::test]
async fn response_audio_skips_synthesis() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let answer = write_tone(dir.path(), "answer.wav", 2.0, 44100, 300.0);
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Audio(answer))))
        .await
        .unwrap();

    assert_eq!(pipeline.adapter().synthesizer().calls(), 0);
    assert!(report.synthesis.turns.is_empty());
    assert_close(span(&report, SegmentKind::ResponseVoice).1, 2.0, "response length");
}

#[tokio::test]
async fn script_turns_use_speaker_voices_and_respect_limit() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let script = dir.path().join("answer.script.txt");
    std::fs::write(
        &script,
        "Herman: Welcome back.\nEmma: Today, tide pools.\nHerman: Let's start.\n",
    )
    .unwrap();
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let mut req = request(dir.path(), prompt, Some(ResponseInput::Script(script)));
    req.inputs = req.inputs.with_max_segments(Some(2));

    let report = pipeline.run(&req).await.unwrap();

    let requests = pipeline.adapter().synthesizer().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].text, "Welcome back.");
    assert_eq!(requests[0].voice, "am_adam");
    assert_eq!(requests[1].voice, "bf_emma");
    assert_eq!(report.synthesis.turns.len(), 2);
    assert_close(span(&report, SegmentKind::ResponseVoice).1, 2.0, "two one-second turns");
}

#[tokio::test]
async fn same_inputs_produce_identical_files() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 2.0, 48000, 250.0);
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let response = Some(ResponseInput::Text("Same every time.".to_string()));

    let mut first = request(dir.path(), prompt.clone(), response.clone());
    first.output_path = dir.path().join("a.wav");
    let mut second = request(dir.path(), prompt, response);
    second.output_path = dir.path().join("b.wav");

    pipeline.run(&first).await.unwrap();
    pipeline.run(&second).await.unwrap();

    assert_eq!(
        std::fs::read(&first.output_path).unwrap(),
        std::fs::read(&second.output_path).unwrap()
    );
}

#[tokio::test]
async fn existing_output_is_replaced() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let req = request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string())));
    std::fs::create_dir_all(req.output_path.parent().unwrap()).unwrap();
    std::fs::write(&req.output_path, b"stale").unwrap();

    pipeline.run(&req).await.unwrap();

    assert!(hound::WavReader::open(&req.output_path).is_ok());
    let leftovers: Vec<_> = std::fs::read_dir(req.output_path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn queue_processes_prompts_and_archives_successes() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("to-process");
    let done = dir.path().join("done");
    let out = dir.path().join("episodes");
    std::fs::create_dir_all(&inbox).unwrap();

    write_tone(&inbox, "a.wav", 1.0, 44100, 200.0);
    std::fs::write(inbox.join("a.txt"), "First answer.").unwrap();
    write_tone(&inbox, "b.wav", 1.0, 44100, 200.0);
    std::fs::write(inbox.join("b.script.txt"), "Emma: Second answer.").unwrap();
    // no response: fails while assembling and stays put
    write_tone(&inbox, "c.wav", 1.0, 44100, 200.0);

    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let summary = process_queue(&pipeline, &inbox, &done, &out, None)
        .await
        .unwrap();

    assert_eq!(summary.completed.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Assembling);
    assert_eq!(summary.failed[0].kind, "EmptyPlanError");

    assert!(out.join("a.wav").is_file());
    assert!(out.join("b.wav").is_file());
    assert!(!out.join("c.wav").exists());

    assert!(done.join("a.wav").is_file());
    assert!(done.join("a.txt").is_file());
    assert!(done.join("b.script.txt").is_file());
    assert!(inbox.join("c.wav").is_file());
    assert!(!inbox.join("a.wav").exists());
}

#[tokio::test]
async fn queue_refuses_prompts_sharing_a_name() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("to-process");
    let done = dir.path().join("done");
    let out = dir.path().join("episodes");
    std::fs::create_dir_all(&inbox).unwrap();

    write_tone(&inbox, "q.mp3", 1.0, 44100, 200.0);
    write_tone(&inbox, "q.wav", 3.0, 44100, 200.0);
    std::fs::write(inbox.join("q.txt"), "Shared answer.").unwrap();

    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let summary = process_queue(&pipeline, &inbox, &done, &out, None)
        .await
        .unwrap();

    assert_eq!(summary.completed.len(), 1);
    assert_eq!(summary.completed[0].episode.audio_path, out.join("q.wav"));
    // q.mp3 sorts first and keeps the name; its one-second prompt is what got written.
    assert_close(span(&summary.completed[0], SegmentKind::PromptVoice).1, 1.0, "prompt");

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].prompt, inbox.join("q.wav"));
    assert_eq!(summary.failed[0].stage, Stage::Collecting);
    assert_eq!(summary.failed[0].kind, "InvalidPlanError");
    assert!(summary.failed[0].message.contains("q.mp3"), "{}", summary.failed[0].message);

    assert!(inbox.join("q.wav").is_file());
    assert!(done.join("q.mp3").is_file());
    assert_eq!(pipeline.adapter().synthesizer().calls(), 1);
}

#[tokio::test]
async fn metadata_file_describes_the_episode() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 44100, 200.0);
    let script = dir.path().join("answer.script.txt");
    std::fs::write(&script, "Herman: Welcome back.\nEmma: Today, tide pools.\n").unwrap();
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Script(script))))
        .await
        .unwrap();

    let metadata_file = dir.path().join("out").join("episode.json");
    assert_eq!(report.metadata_path, metadata_file);
    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&metadata_file).unwrap()).unwrap();

    assert_eq!(metadata["episode_name"], "episode");
    assert_eq!(metadata["audio_file"], "episode.wav");
    assert_eq!(metadata["segments_count"], 2);
    assert_eq!(metadata["voices"], serde_json::json!(["am_adam", "bf_emma"]));
    // The mock reports 10 ms of generation per clip.
    assert!((metadata["total_tts_secs"].as_f64().unwrap() - 0.02).abs() < 1e-9);
    assert!((metadata["avg_tts_secs"].as_f64().unwrap() - 0.01).abs() < 1e-9);
    assert_close(
        metadata["audio_duration_secs"].as_f64().unwrap(),
        report.episode.total_duration_secs,
        "audio duration",
    );
    assert!((metadata["realtime_factor"].as_f64().unwrap() - 0.01).abs() < 1e-9);
}

#[tokio::test]
async fn synthesized_speech_at_another_rate_is_conformed() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 1.0, 48000, 200.0);
    let mock = MockSynthesizer::new()
        .with_sample_rate(16000)
        .with_speech_duration(Duration::from_secs(2));
    let pipeline = pipeline_with(Config::default(), mock);

    let report = pipeline
        .run(&request(dir.path(), prompt, Some(ResponseInput::Text("Low rate.".to_string()))))
        .await
        .unwrap();

    assert_close(span(&report, SegmentKind::PromptVoice).1, 1.0, "prompt length");
    assert_close(span(&report, SegmentKind::ResponseVoice).1, 2.0, "response length");
    let reader = hound::WavReader::open(&report.episode.audio_path).unwrap();
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.spec().channels, 1);
}

#[tokio::test]
async fn truncated_prompt_fails_while_assembling() {
    let dir = TempDir::new().unwrap();
    let prompt = write_tone(dir.path(), "prompt.wav", 2.0, 44100, 200.0);
    let bytes = std::fs::read(&prompt).unwrap();
    std::fs::write(&prompt, &bytes[..bytes.len() / 2]).unwrap();
    let pipeline = pipeline_with(Config::default(), MockSynthesizer::new());
    let req = request(dir.path(), prompt, Some(ResponseInput::Text("Hi".to_string())));

    let err = pipeline.run(&req).await.unwrap_err();

    assert_eq!(err.stage, Stage::Assembling);
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    assert!(!req.output_path.exists());
    assert!(!podgen::pipeline::metadata_path(&req.output_path).exists());
}
