use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::*;

#[test]
fn test_command_paths() {
    assert_eq!(RemoteCommand::Rewind.path(), "beginrew");
    assert_eq!(RemoteCommand::FastForward.path(), "beginff");
    assert_eq!(RemoteCommand::Previous.path(), "previtem");
    assert_eq!(RemoteCommand::Next.path(), "nextitem");
    assert_eq!(RemoteCommand::Toggle.path(), "playpause");
    assert_eq!(RemoteCommand::Resume.path(), "playresume");
    assert_eq!(RemoteCommand::Stop.path(), "stop");
    assert_eq!(RemoteCommand::VolumeDown.path(), "volumedown");
}

#[test]
fn test_volume_command_db() {
    assert_eq!(
        RemoteCommand::Volume(0.0).path(),
        "setproperty?dmcp.device-volume=-144.0000"
    );
    assert_eq!(
        RemoteCommand::Volume(1.0).path(),
        "setproperty?dmcp.device-volume=0.0000"
    );
    assert_eq!(
        RemoteCommand::Volume(0.5).path(),
        "setproperty?dmcp.device-volume=-15.0000"
    );
}

#[test]
fn test_request_format() {
    let target = RemoteTarget::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 3689)), "1986535575");
    assert_eq!(
        target.request(RemoteCommand::Next),
        "GET /ctrl-int/1/nextitem HTTP/1.0\r\nActive-Remote: 1986535575\r\nConnection: close\r\n\r\n"
    );
}

#[test]
fn test_matches_dacp_id() {
    let name = "iTunes_Ctrl_3EC64D8E2F6C1A29._dacp._tcp.local.";
    assert!(matches_dacp_id(name, "3EC64D8E2F6C1A29"));
    assert!(matches_dacp_id(name, "3ec64d8e2f6c1a29"));
    assert!(!matches_dacp_id(name, "0000000000000000"));
    assert!(!matches_dacp_id(name, ""));
}

async fn one_shot_server(reply: &'static [u8]) -> (SocketAddr, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        stream.write_all(reply).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    });
    (addr, handle)
}

#[tokio::test]
async fn test_send_accepts_no_content() {
    let (addr, server) = one_shot_server(b"HTTP/1.1 204 No Content\r\n\r\n").await;
    let target = RemoteTarget::new(addr, "42");

    target.send(RemoteCommand::Toggle).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /ctrl-int/1/playpause HTTP/1.0\r\n"));
    assert!(request.contains("Active-Remote: 42\r\n"));
}

#[tokio::test]
async fn test_send_reports_rejection() {
    let (addr, _server) = one_shot_server(b"HTTP/1.1 403 Forbidden\r\n\r\n").await;
    let target = RemoteTarget::new(addr, "42");

    let err = target.send(RemoteCommand::Play).await.unwrap_err();
    assert!(matches!(err, DacpError::Rejected(403)));
}

#[test]
fn test_browse_stopped_by_last_user_only() {
    use super::resolver::BrowseUsers;

    let users = BrowseUsers::default();
    let mut stops = 0;

    // a cancelled lookup still running, then the next session's lookup
    users.enter(|| Ok::<_, ()>(())).unwrap();
    users.enter(|| Ok::<_, ()>(())).unwrap();
    assert_eq!(users.count(), 2);

    users.leave(|| stops += 1);
    assert_eq!(stops, 0);
    users.leave(|| stops += 1);
    assert_eq!(stops, 1);
    assert_eq!(users.count(), 0);
}

#[test]
fn test_failed_browse_is_not_counted() {
    use super::resolver::BrowseUsers;

    let users = BrowseUsers::default();
    assert_eq!(users.enter(|| Err::<(), _>("daemon gone")), Err("daemon gone"));
    assert_eq!(users.count(), 0);
}
