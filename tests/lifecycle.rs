//! End-to-end lifecycle scenarios against a fake in-process caster,
//! exercising the state machine the way a real CORS connection would.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use ntrip_rover::{
    config::NtripConfig,
    state::{NtripError, NtripState},
    NtripClient,
};
use tokio::net::TcpListener;

fn base_config(port: u16) -> NtripConfig {
    NtripConfig {
        host: "127.0.0.1".into(),
        port,
        user: "u".into(),
        password: "p".into(),
        mountpoint: "M".into(),
        gga_report_interval_s: 1,
        connect_timeout_ms: 1000,
        recv_timeout_ms: 1000,
        reconnect_interval_ms: 50,
        max_reconnect_interval_ms: 100,
        max_reconnect_attempts: 0,
        ..NtripConfig::default()
    }
}

#[derive(Default)]
struct Recorder {
    states: Mutex<Vec<(NtripState, NtripState)>>,
    rtcm: Mutex<Vec<u8>>,
    errors: Mutex<Vec<NtripError>>,
}

fn wire_recorder(client: &NtripClient) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());

    let r = recorder.clone();
    client.set_state_callback(move |old, new| r.states.lock().unwrap().push((old, new)));

    let r = recorder.clone();
    client.set_rtcm_callback(move |data| r.rtcm.lock().unwrap().extend_from_slice(data));

    let r = recorder.clone();
    client.set_error_callback(move |err, _detail| r.errors.lock().unwrap().push(err));

    recorder
}

async fn wait_until(client: &NtripClient, target: NtripState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while client.get_state() != target {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for state {target:?}, currently {:?}", client.get_state());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn happy_path_receives_rtcm_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await.unwrap();
        sock.write_all(b"ICY 200 OK\r\n\r\n").await.unwrap();
        sock.write_all(&[0x01, 0x02, 0x03]).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut config = base_config(port);
    config.latitude = 22.547;
    config.longitude = 114.086;

    let client = NtripClient::new(config);
    let recorder = wire_recorder(&client);

    client.connect();
    wait_until(&client, NtripState::Running, Duration::from_secs(2)).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(*recorder.rtcm.lock().unwrap(), vec![0x01, 0x02, 0x03]);

    let states = recorder.states.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![
            (NtripState::Disconnected, NtripState::Connecting),
            (NtripState::Connecting, NtripState::Running),
        ]
    );

    client.disconnect().await;
    assert_eq!(client.get_state(), NtripState::Disconnected);
}

#[tokio::test]
async fn waiting_lla_unblocks_on_set_location() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await.unwrap();
        sock.write_all(b"ICY 200 OK\r\n\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = NtripClient::new(base_config(port));
    client.connect();

    wait_until(&client, NtripState::WaitingLla, Duration::from_secs(1)).await;

    client.set_location(22.5, 114.0);

    wait_until(&client, NtripState::Running, Duration::from_secs(2)).await;

    client.disconnect().await;
}

#[tokio::test]
async fn bad_credentials_is_terminal_even_with_auto_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await.unwrap();
        sock.write_all(b"HTTP/1.1 401 Unauthorized\r\n\r\n")
            .await
            .unwrap();
    });

    let mut config = base_config(port);
    config.latitude = 22.547;
    config.longitude = 114.086;
    config.auto_reconnect = true;

    let client = NtripClient::new(config);
    client.connect();

    wait_until(&client, NtripState::Error, Duration::from_secs(2)).await;
    assert_eq!(client.get_last_error(), NtripError::BadPassword);

    // No retry: state stays Error well past a would-be backoff window.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.get_state(), NtripState::Error);

    assert!(client.reset());
    assert_eq!(client.get_state(), NtripState::Disconnected);
}

#[tokio::test]
async fn budget_exhaustion_reports_reconnect_failed() {
    // Nothing is listening on this port: every connect attempt fails fast.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = base_config(port);
    config.latitude = 22.547;
    config.longitude = 114.086;
    config.max_reconnect_attempts = 2;
    config.reconnect_interval_ms = 10;
    config.max_reconnect_interval_ms = 20;

    let client = NtripClient::new(config);
    let recorder = wire_recorder(&client);

    client.connect();
    wait_until(&client, NtripState::Error, Duration::from_secs(5)).await;

    assert_eq!(client.get_last_error(), NtripError::ReconnectFailed);
    let reconnecting_count = recorder
        .states
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, to)| *to == NtripState::Reconnecting)
        .count();
    assert_eq!(reconnecting_count, 2);
}

#[tokio::test]
async fn write_rtcm_data_works_before_connect() {
    let client = NtripClient::new(base_config(0));
    let recorder = wire_recorder(&client);
    client.write_rtcm_data(&[7, 8, 9]);
    assert_eq!(*recorder.rtcm.lock().unwrap(), vec![7, 8, 9]);
    assert_eq!(client.get_state(), NtripState::Disconnected);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let client = NtripClient::new(base_config(0));
    client.disconnect().await;
    client.disconnect().await;
    assert_eq!(client.get_state(), NtripState::Disconnected);
}
