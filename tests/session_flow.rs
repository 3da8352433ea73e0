//! End-to-end relay session flow: the client-side audio engine feeding the
//! session state machine, with upstream events simulated, exercising a full
//! push-to-talk turn and a barge-in.

use voice_relay_backend::audio::codec::{encode_pcm16, float_to_int16};
use voice_relay_backend::engine::AudioEngine;
use voice_relay_backend::protocol::{AudioDeltaPayload, ClientMessage, ServerMessage, UpstreamEvent};
use voice_relay_backend::relay::{RelayEffect, RelayState, SessionRelay};

/// Apply relay effects the way the connection actor would, collecting the
/// upstream-facing ones and delivering downstream messages to the engine.
fn apply(effects: Vec<RelayEffect>, engine: &mut AudioEngine, upstream_log: &mut Vec<String>) {
    for effect in effects {
        match effect {
            RelayEffect::ForwardAudio(_) => upstream_log.push("audio".to_string()),
            RelayEffect::CommitUpstream => upstream_log.push("commit".to_string()),
            RelayEffect::CancelUpstream => upstream_log.push("cancel".to_string()),
            RelayEffect::CloseUpstream => upstream_log.push("close".to_string()),
            RelayEffect::Send(msg) => engine.on_server_message(msg),
        }
    }
}

fn audio_delta(value: f32, samples: usize) -> UpstreamEvent {
    UpstreamEvent::AudioDelta {
        audio: AudioDeltaPayload {
            data: encode_pcm16(&vec![float_to_int16(value); samples]),
            sample_rate_hz: Some(24000),
        },
    }
}

#[test]
fn full_turn_capture_to_playback() {
    let mut engine = AudioEngine::new(48000, 24000);
    let mut relay = SessionRelay::new();
    let mut upstream_log = Vec::new();
    relay.upstream_ready();

    // 480 ms of microphone audio at 48 kHz arrives in device-sized bursts;
    // the engine frames it into exactly 16 transport chunks of 30 ms each.
    let mut chunks = Vec::new();
    for _ in 0..48 {
        // 10 ms per burst
        chunks.extend(engine.on_mic_samples(&vec![0.25f32; 480]));
    }
    assert_eq!(chunks.len(), 16);

    for chunk in chunks {
        let effects = relay.on_client_message(chunk);
        apply(effects, &mut engine, &mut upstream_log);
    }
    assert_eq!(relay.state(), RelayState::Listening);
    assert_eq!(upstream_log.iter().filter(|e| *e == "audio").count(), 16);

    // Button released.
    let effects = relay.on_client_message(engine.commit());
    apply(effects, &mut engine, &mut upstream_log);
    assert_eq!(relay.state(), RelayState::Processing);
    assert_eq!(upstream_log.last().map(String::as_str), Some("commit"));

    // Response audio flows back and reaches the speaker.
    let effects = relay.on_upstream_event(audio_delta(0.5, 2400));
    apply(effects, &mut engine, &mut upstream_log);
    assert_eq!(relay.state(), RelayState::Speaking);
    assert!(engine.is_speaking());
    assert!(engine.level() > 0.0);

    let rendered = engine.render(1024);
    assert_eq!(rendered.len(), 1024);
    assert!(rendered.iter().any(|&s| s != 0.0));

    // Natural completion: back to Ready, remaining audio keeps draining.
    let effects = relay.on_upstream_event(UpstreamEvent::Completed);
    apply(effects, &mut engine, &mut upstream_log);
    assert_eq!(relay.state(), RelayState::Ready);
    assert!(!engine.is_speaking());
    let rendered = engine.render(1024);
    assert!(rendered.iter().any(|&s| s != 0.0));
}

#[test]
fn barge_in_cancels_upstream_and_silences_playback() {
    let mut engine = AudioEngine::new(48000, 24000);
    let mut relay = SessionRelay::new();
    let mut upstream_log = Vec::new();
    relay.upstream_ready();

    // Get a turn into the Speaking state with audio queued locally.
    let chunks = engine.on_mic_samples(&vec![0.25f32; 1440]);
    for chunk in chunks {
        apply(relay.on_client_message(chunk), &mut engine, &mut upstream_log);
    }
    apply(
        relay.on_client_message(engine.commit()),
        &mut engine,
        &mut upstream_log,
    );
    apply(
        relay.on_upstream_event(audio_delta(0.5, 4800)),
        &mut engine,
        &mut upstream_log,
    );
    assert_eq!(relay.state(), RelayState::Speaking);

    // Barge-in: the cancel reaches the upstream before the flush happens
    // downstream, and the speaker goes silent immediately.
    upstream_log.clear();
    let effects = relay.on_client_message(engine.interrupt());
    apply(effects, &mut engine, &mut upstream_log);
    assert_eq!(relay.state(), RelayState::Interrupted);
    assert_eq!(upstream_log, vec!["cancel".to_string()]);
    assert!(engine.render(1024).iter().all(|&s| s == 0.0));

    // A stale delta racing in after the cancel never reaches playback.
    let effects = relay.on_upstream_event(audio_delta(0.9, 2400));
    assert!(effects.is_empty());
    assert!(engine.render(256).iter().all(|&s| s == 0.0));

    // The next utterance starts a fresh turn from the Interrupted state.
    let chunks = engine.on_mic_samples(&vec![0.25f32; 1440]);
    assert_eq!(chunks.len(), 1);
    for chunk in chunks {
        apply(relay.on_client_message(chunk), &mut engine, &mut upstream_log);
    }
    assert_eq!(relay.state(), RelayState::Listening);
    apply(
        relay.on_client_message(engine.commit()),
        &mut engine,
        &mut upstream_log,
    );
    apply(
        relay.on_upstream_event(audio_delta(0.5, 2400)),
        &mut engine,
        &mut upstream_log,
    );
    assert_eq!(relay.state(), RelayState::Speaking);
    assert!(engine.render(256).iter().any(|&s| s != 0.0));
}
