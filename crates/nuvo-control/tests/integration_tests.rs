//! Integration tests for the zone controller
//!
//! These drive a [`ZoneController`] against the virtual amplifier and cover:
//! - Status round trips for both amplifier families
//! - Retry behavior when the amplifier is silent, busy or drops terminators
//! - Draining of unsolicited frames and source-name folding
//! - Restore ordering and lock serialization across threads

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nuvo_control::{ControllerConfig, ZoneController};
use nuvo_protocol::{Model, NuvoCommand, ZoneStatus};
use nuvo_sim::{Fault, VirtualAmplifier, VirtualAmplifierConfig, ZoneState};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub const TIMEOUT: Duration = Duration::from_millis(30);

    pub fn fast_config() -> ControllerConfig {
        ControllerConfig {
            response_timeout: TIMEOUT,
            ..Default::default()
        }
    }

    /// Controller over an eight-zone virtual amplifier
    pub fn controller(model: Model) -> ZoneController<VirtualAmplifier> {
        ZoneController::with_config(VirtualAmplifier::new("test", model, 8), fast_config())
    }

    pub fn controller_with(config: VirtualAmplifierConfig) -> ZoneController<VirtualAmplifier> {
        ZoneController::with_config(VirtualAmplifier::from_config(config), fast_config())
    }

    pub fn set_fault(nuvo: &ZoneController<VirtualAmplifier>, fault: Fault) {
        nuvo.with_transport(|amp| amp.set_fault(fault));
    }

    pub fn received(nuvo: &ZoneController<VirtualAmplifier>) -> Vec<NuvoCommand> {
        nuvo.with_transport(|amp| amp.received_commands().to_vec())
    }

    pub fn clear_received(nuvo: &ZoneController<VirtualAmplifier>) {
        nuvo.with_transport(|amp| amp.clear_received());
    }
}

// ============================================================================
// Status Queries
// ============================================================================

mod status_tests {
    use super::*;

    #[test]
    fn test_status_round_trip_zone_7() {
        let nuvo = helpers::controller(Model::Concerto);
        nuvo.with_transport(|amp| {
            amp.set_zone(
                7,
                ZoneState {
                    power: true,
                    source: 3,
                    attenuation: 45,
                    ..Default::default()
                },
            )
        });

        let status = nuvo.zone_status(7).unwrap();

        assert_eq!(status.zone, 7);
        assert!(status.power);
        assert_eq!(status.source, "3");
        assert!(!status.mute);
        assert_eq!(status.volume, -45);
        assert_eq!(helpers::received(&nuvo), vec![NuvoCommand::status(7)]);
    }

    #[test]
    fn test_status_simplese_muted() {
        let nuvo = helpers::controller(Model::Simplese);
        nuvo.set_power(2, true);
        nuvo.set_mute(2, true);

        let status = nuvo.zone_status(2).unwrap();

        assert!(status.power);
        assert!(status.mute);
        assert_eq!(status.volume, -40);
    }

    #[test]
    fn test_status_reflects_setters() {
        let nuvo = helpers::controller(Model::Concerto);

        nuvo.set_power(4, true);
        nuvo.set_volume(4, -45.7);
        nuvo.set_source(4, 9);

        let status = nuvo.zone_status(4).unwrap();
        assert!(status.power);
        assert_eq!(status.volume, -46);
        assert_eq!(status.source, "6");
    }

    #[test]
    fn test_tone_setters_reach_amplifier() {
        let nuvo = helpers::controller(Model::Concerto);

        nuvo.set_treble(1, 20);
        nuvo.set_bass(1, -20);

        let zone = nuvo.with_transport(|amp| amp.zone(1).cloned()).unwrap();
        assert_eq!(zone.treble, 12);
        assert_eq!(zone.bass, -12);
    }

    #[test]
    fn test_status_folds_source_name() {
        let nuvo = helpers::controller_with(VirtualAmplifierConfig {
            source_names: vec!["CD".into(), "TUNER".into()],
            announce_source_names: true,
            ..Default::default()
        });

        nuvo.set_source(2, 2);
        let status = nuvo.zone_status(2).unwrap();

        assert_eq!(status.source, "2");
        assert_eq!(status.sourcename, "TUNER");
    }

    #[test]
    fn test_unsolicited_frames_are_drained() {
        let nuvo = helpers::controller(Model::Concerto);
        nuvo.with_transport(|amp| {
            amp.push_unsolicited("#Z03PWRON,SRC5,VOL-10");
            amp.push_unsolicited("#Z01PWRON,SRC6,VOL-11");
        });

        let status = nuvo.zone_status(1).unwrap();

        assert!(!status.power);
        assert_eq!(status.source, "1");
        assert_eq!(helpers::received(&nuvo).len(), 1);
    }

    #[test]
    fn test_zone_above_nine_never_sent() {
        let nuvo = helpers::controller(Model::Concerto);

        assert!(nuvo.zone_status(10).is_none());
        assert!(helpers::received(&nuvo).is_empty());
    }
}

// ============================================================================
// Retry and Failure Handling
// ============================================================================

mod retry_tests {
    use super::*;

    #[test]
    fn test_silent_amplifier_five_attempts() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Silent);

        assert!(nuvo.zone_status(1).is_none());
        assert_eq!(helpers::received(&nuvo), vec![NuvoCommand::status(1); 5]);
    }

    #[test]
    fn test_unterminated_reply_five_attempts() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Unterminated);

        assert!(nuvo.zone_status(3).is_none());
        assert_eq!(helpers::received(&nuvo), vec![NuvoCommand::status(3); 5]);
    }

    #[test]
    fn test_status_current_after_unterminated_replies() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Unterminated);
        assert!(nuvo.zone_status(3).is_none());

        helpers::set_fault(&nuvo, Fault::None);
        nuvo.with_transport(|amp| {
            amp.set_zone(
                3,
                ZoneState {
                    power: true,
                    source: 5,
                    attenuation: 12,
                    ..Default::default()
                },
            )
        });

        let status = nuvo.zone_status(3).unwrap();
        assert!(status.power);
        assert_eq!(status.source, "5");
        assert_eq!(status.volume, -12);
    }

    #[test]
    fn test_setter_timeout_does_not_taint_status() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Unterminated);
        nuvo.set_power(4, true);

        helpers::set_fault(&nuvo, Fault::None);
        nuvo.set_source(4, 2);
        let status = nuvo.zone_status(4).unwrap();

        assert!(status.power);
        assert_eq!(status.source, "2");
    }

    #[test]
    fn test_busy_then_recovers() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Busy(2));

        let status = nuvo.zone_status(5).unwrap();

        assert_eq!(status.zone, 5);
        assert_eq!(helpers::received(&nuvo).len(), 3);
    }

    #[test]
    fn test_busy_beyond_retry_budget() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Busy(5));

        assert!(nuvo.zone_status(5).is_none());
        assert!(nuvo.zone_status(5).is_some());
    }

    #[test]
    fn test_custom_retry_budget() {
        let amp = VirtualAmplifier::new("test", Model::Concerto, 8);
        let nuvo = ZoneController::with_config(
            amp,
            ControllerConfig {
                max_retries: 1,
                retry_delay: Duration::from_millis(5),
                ..helpers::fast_config()
            },
        );
        helpers::set_fault(&nuvo, Fault::Silent);

        assert!(nuvo.zone_status(2).is_none());
        assert_eq!(helpers::received(&nuvo).len(), 2);
    }

    #[test]
    fn test_disconnected_fails_silently() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Disconnected);

        assert!(nuvo.zone_status(1).is_none());
        nuvo.set_power(1, true);
        assert!(helpers::received(&nuvo).is_empty());

        helpers::set_fault(&nuvo, Fault::None);
        assert!(nuvo.zone_status(1).is_some());
    }

    #[test]
    fn test_setters_against_silent_amp_return() {
        let nuvo = helpers::controller(Model::Concerto);
        helpers::set_fault(&nuvo, Fault::Silent);

        let start = Instant::now();
        nuvo.set_power(1, true);
        nuvo.set_volume(1, -20.0);
        let elapsed = start.elapsed();

        // One response deadline per command, no retries
        assert!(elapsed < helpers::TIMEOUT * 5, "took {:?}", elapsed);
        assert_eq!(helpers::received(&nuvo).len(), 2);

        let zone = nuvo.with_transport(|amp| amp.zone(1).cloned()).unwrap();
        assert!(zone.power);
        assert_eq!(zone.attenuation, 20);
    }
}

// ============================================================================
// Restore
// ============================================================================

mod restore_tests {
    use super::*;

    fn snapshot() -> ZoneStatus {
        ZoneStatus {
            zone: 6,
            power: true,
            source: "5".to_string(),
            mute: false,
            volume: -33,
            treble: 4,
            bass: -4,
            sourcename: "TUNER".to_string(),
        }
    }

    #[test]
    fn test_restore_sends_power_mute_volume_source() {
        let nuvo = helpers::controller(Model::Concerto);

        nuvo.restore_zone(&snapshot());

        assert_eq!(
            helpers::received(&nuvo),
            vec![
                NuvoCommand::power(6, true),
                NuvoCommand::mute(6, false),
                NuvoCommand::volume(6, -33.0),
                NuvoCommand::source(6, 5),
            ]
        );
    }

    #[test]
    fn test_snapshot_restores_state() {
        let nuvo = helpers::controller(Model::Concerto);
        nuvo.restore_zone(&snapshot());
        let saved = nuvo.zone_status(6).unwrap();

        nuvo.set_power(6, false);
        nuvo.set_volume(6, -70.0);
        nuvo.set_source(6, 1);
        helpers::clear_received(&nuvo);

        nuvo.restore_zone(&saved);
        let restored = nuvo.zone_status(6).unwrap();

        assert_eq!(restored, saved);
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_threads_do_not_interleave() {
        let nuvo = Arc::new(helpers::controller(Model::Concerto));

        let handles: Vec<_> = (1..=4u8)
            .map(|zone| {
                let nuvo = Arc::clone(&nuvo);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    for step in 0..5u8 {
                        let volume = -f64::from(zone * 10 + step);
                        nuvo.set_volume(zone, volume);
                        seen.push(nuvo.zone_status(zone));
                    }
                    (zone, seen)
                })
            })
            .collect();

        for handle in handles {
            let (zone, seen) = handle.join().unwrap();
            for (step, status) in seen.into_iter().enumerate() {
                let status = status.unwrap();
                assert_eq!(status.zone, zone);
                assert_eq!(status.volume, -((zone * 10) as i8 + step as i8));
            }
        }

        assert_eq!(helpers::received(&nuvo).len(), 40);
    }

    #[test]
    fn test_restore_is_atomic() {
        let nuvo = Arc::new(helpers::controller(Model::Concerto));
        let status = ZoneStatus {
            zone: 2,
            power: true,
            source: "3".to_string(),
            mute: true,
            volume: -40,
            treble: 0,
            bass: 0,
            sourcename: String::new(),
        };

        let restorer = {
            let nuvo = Arc::clone(&nuvo);
            thread::spawn(move || nuvo.restore_zone(&status))
        };
        let poller = {
            let nuvo = Arc::clone(&nuvo);
            thread::spawn(move || {
                for _ in 0..3 {
                    nuvo.zone_status(1);
                }
            })
        };
        restorer.join().unwrap();
        poller.join().unwrap();

        let zone_two: Vec<_> = helpers::received(&nuvo)
            .into_iter()
            .filter(|cmd| cmd.zone() == 2)
            .collect();
        assert_eq!(zone_two.len(), 4);

        let commands = helpers::received(&nuvo);
        let first = commands.iter().position(|c| c.zone() == 2).unwrap();
        assert!(commands[first..first + 4].iter().all(|c| c.zone() == 2));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> impl Strategy<Value = Model> {
        prop_oneof![Just(Model::Concerto), Just(Model::Simplese)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn status_matches_amplifier_state(
            model in model(),
            zone in 1u8..=8,
            power: bool,
            mute: bool,
            source in 1u8..=6,
            attenuation in 0u8..=78,
        ) {
            let nuvo = helpers::controller(model);
            nuvo.with_transport(|amp| amp.set_zone(zone, ZoneState {
                power,
                source,
                attenuation,
                mute,
                ..Default::default()
            }));

            let status = nuvo.zone_status(zone).unwrap();

            prop_assert_eq!(status.zone, zone);
            prop_assert_eq!(status.power, power);
            prop_assert_eq!(status.mute, mute);
            prop_assert_eq!(status.source, source.to_string());
            let expected = if mute { -40 } else { -(attenuation as i8) };
            prop_assert_eq!(status.volume, expected);
        }

        #[test]
        fn restore_always_four_commands(
            zone in 1u8..=8,
            power: bool,
            mute: bool,
            volume in -78i8..=0,
            source in 1u8..=6,
        ) {
            let nuvo = helpers::controller(Model::Concerto);
            let status = ZoneStatus {
                zone,
                power,
                source: source.to_string(),
                mute,
                volume,
                treble: 0,
                bass: 0,
                sourcename: String::new(),
            };

            nuvo.restore_zone(&status);

            let commands = helpers::received(&nuvo);
            prop_assert_eq!(commands.len(), 4);
            prop_assert!(commands.iter().all(|c| c.zone() == zone && !c.is_query()));
        }
    }
}
