//! Live streamer tests against a local TCP fixture speaking just enough
//! HTTP to carry an MJPEG body.

use movi_media::info::LoadOptions;
use movi_stream::{streamer_for_url, Error};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn jpeg(payload: &[u8]) -> Vec<u8> {
    let mut v = vec![0xFF, 0xD8];
    v.extend_from_slice(payload);
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// Accept one connection, answer with a multipart MJPEG body carrying the
/// given frames, then hold the socket open.
async fn serve_frames(frames: Vec<Vec<u8>>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut head = [0u8; 1024];
        let _ = sock.read(&mut head).await;
        sock.write_all(
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
              Connection: close\r\n\r\n",
        )
        .await
        .unwrap();
        for frame in frames {
            sock.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")
                .await
                .unwrap();
            sock.write_all(&frame).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // keep the connection open; the client decides when to stop
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    (format!("http://{addr}/stream"), server)
}

#[tokio::test]
async fn test_position_counts_received_frames() {
    let frames = vec![jpeg(&[1, 2]), jpeg(&[3, 4, 5])];
    let (url, server) = serve_frames(frames.clone()).await;

    let mut stream = streamer_for_url(&url, &LoadOptions::default()).await.unwrap();
    assert!(stream.is_connected());

    for _ in 0..200 {
        if stream.video_position() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stream.video_position(), 2);

    // reads return the latest complete frame and never advance a playhead
    let mut out = Vec::new();
    assert_eq!(stream.read_video_frame(&mut out).unwrap(), frames[1].len());
    assert_eq!(out, frames[1]);
    assert_eq!(stream.video_position(), 2);

    assert!(matches!(
        stream.set_video_position(0),
        Err(movi_media::Error::NotSeekable)
    ));

    stream.disconnect_now();
    assert!(!stream.is_connected());
    server.abort();
}

#[tokio::test]
async fn test_read_before_first_frame_is_empty() {
    let (url, server) = serve_frames(Vec::new()).await;
    let mut stream = streamer_for_url(&url, &LoadOptions::default()).await.unwrap();

    assert_eq!(stream.video_position(), 0);
    let mut out = vec![1, 2, 3];
    assert_eq!(stream.read_video_frame(&mut out).unwrap(), 0);
    assert!(out.is_empty());

    // forced teardown works while the worker is blocked waiting for bytes
    stream.disconnect_now();
    assert!(!stream.is_connected());
    server.abort();
}

#[tokio::test]
async fn test_unknown_scheme_is_rejected() {
    assert!(matches!(
        streamer_for_url("rtsp://camera.local/stream", &LoadOptions::default()).await,
        Err(Error::UnsupportedUrl(_))
    ));
}
