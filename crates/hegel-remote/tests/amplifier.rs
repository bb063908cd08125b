//! End-to-end sessions against a simulated amplifier over TCP.

use std::time::Duration;

use tokio::sync::broadcast;

use hegel_core::error::{DeviceError, Error};
use hegel_core::events::AmpEvent;
use hegel_core::DeviceType;
use hegel_remote::{Session, SessionBuilder, Strategy};
use hegel_test_harness::{AmpState, MockAmplifier};

async fn next_event(rx: &mut broadcast::Receiver<AmpEvent>) -> AmpEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .unwrap()
}

#[tokio::test]
async fn connect_sets_reset_delay() {
    let amp = MockAmplifier::start(DeviceType::H190).await.unwrap();
    let session = Session::connect(amp.addr(), DeviceType::H190).await.unwrap();

    assert!(session.is_connected());
    assert_eq!(session.strategy(), Strategy::Deadline);
    assert_eq!(amp.received(), vec![b"-r.3\r".to_vec()]);
    assert_eq!(amp.state().reset_delay, Some(3));

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn commands_drive_amplifier_state() {
    let amp = MockAmplifier::start(DeviceType::H390).await.unwrap();
    let session = Session::connect(amp.addr(), DeviceType::H390).await.unwrap();

    assert_eq!(session.get_volume().await.unwrap(), 20);
    assert_eq!(session.set_volume(42).await.unwrap(), 42);
    assert_eq!(session.volume_up().await.unwrap(), 43);
    assert!(session.toggle_mute().await.unwrap());
    assert!(!session.set_power(false).await.unwrap());
    assert_eq!(session.set_input_by_name("USB").await.unwrap(), 9);
    assert_eq!(session.get_input_name().await.unwrap(), "USB");
    assert!(session.stop_reset_delay().await.unwrap().stopped);

    assert_eq!(
        amp.state(),
        AmpState {
            power: false,
            volume: 43,
            muted: true,
            input: 9,
            reset_delay: None,
        }
    );

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn device_rejects_input_past_catalog() {
    let amp = MockAmplifier::start(DeviceType::H95).await.unwrap();
    let session = Session::connect(amp.addr(), DeviceType::H95).await.unwrap();

    assert!(matches!(
        session.set_input(9).await,
        Err(Error::Device(DeviceError::InvalidParameter))
    ));
    assert_eq!(amp.state().input, 1);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn front_panel_changes_become_events() {
    let amp = MockAmplifier::start(DeviceType::H590).await.unwrap();
    let session = Session::connect(amp.addr(), DeviceType::H590).await.unwrap();
    let mut rx = session.subscribe();

    amp.front_panel_volume(33);
    assert_eq!(next_event(&mut rx).await, AmpEvent::VolumeChanged { volume: 33 });

    amp.front_panel_power(false);
    assert_eq!(next_event(&mut rx).await, AmpEvent::PowerChanged { on: false });

    amp.fire_reset();
    assert_eq!(next_event(&mut rx).await, AmpEvent::RemoteReset);

    // Commands still pair with their own responses afterwards.
    assert_eq!(session.get_volume().await.unwrap(), 33);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn reconnect_after_disconnect() {
    let amp = MockAmplifier::start(DeviceType::H120).await.unwrap();

    let session = Session::connect(amp.addr(), DeviceType::H120).await.unwrap();
    session.set_volume(55).await.unwrap();
    session.disconnect().await.unwrap();
    assert!(!session.is_connected());

    let session = SessionBuilder::new(DeviceType::H120)
        .keep_alive(false)
        .connect(amp.addr())
        .await
        .unwrap();
    assert_eq!(session.get_volume().await.unwrap(), 55);
    assert_eq!(amp.connections(), 2);

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn amplifier_going_away_is_reported() {
    let amp = MockAmplifier::start(DeviceType::Rost).await.unwrap();
    let (tx, mut rx) = broadcast::channel(16);
    let session = SessionBuilder::new(DeviceType::Rost)
        .events(tx)
        .connect(amp.addr())
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await, AmpEvent::Connected);

    drop(amp);

    match next_event(&mut rx).await {
        AmpEvent::Error { message } => assert_eq!(message, "connection lost"),
        other => panic!("expected Error event, got {other:?}"),
    }
    assert!(session.get_power().await.is_err());

    session.disconnect().await.unwrap();
    assert_eq!(next_event(&mut rx).await, AmpEvent::Disconnected);
}
