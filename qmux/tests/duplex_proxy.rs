//! Scenario 10: two sessions on either side of a middle proxy session, which
//! forwards every inbound channel from one side to a freshly opened channel
//! on the other and copies bytes in both directions.

use std::time::Duration;

use common::cancellation::Never;
use common::pipe;

use qmux::{Channel, Session};

async fn pump(src: Channel, dst: Channel) {
    let mut buf = [0u8; 256];
    loop {
        let n = src.read(&mut buf).await.unwrap();
        if n == 0 {
            let _ = dst.close_write().await;
            return;
        }
        dst.write(&buf[..n]).await.unwrap();
    }
}

#[async_std::test]
async fn proxies_bytes_bidirectionally_through_a_middle_session() {
    let (a_end, p_a_end) = pipe::duplex();
    let (p_b_end, b_end) = pipe::duplex();

    let session_a = Session::new(a_end.0, a_end.1);
    let session_p_a = Session::new(p_a_end.0, p_a_end.1);
    let session_p_b = Session::new(p_b_end.0, p_b_end.1);
    let session_b = Session::new(b_end.0, b_end.1);

    let proxy = async_std::task::spawn({
        let session_p_a = session_p_a.clone();
        let session_p_b = session_p_b.clone();
        async move {
            loop {
                let from_a = match session_p_a.accept().await {
                    Ok(ch) => ch,
                    Err(_) => return,
                };
                let to_b = match session_p_b.open(&Never).await {
                    Ok(ch) => ch,
                    Err(_) => return,
                };

                async_std::task::spawn(pump(from_a.clone(), to_b.clone()));
                async_std::task::spawn(pump(to_b, from_a));
            }
        }
    });

    let echoer = async_std::task::spawn({
        let session_b = session_b.clone();
        async move {
            let ch = session_b.accept().await.unwrap();
            let mut buf = [0u8; 256];
            loop {
                let n = ch.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                ch.write(&buf[..n]).await.unwrap();
            }
        }
    });

    let ch_a = session_a.open(&Never).await.unwrap();
    ch_a.write(b"hello through the proxy").await.unwrap();
    ch_a.close_write().await.unwrap();

    let mut received = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let n = ch_a.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, b"hello through the proxy");

    async_std::task::sleep(Duration::from_millis(20)).await;
    proxy.cancel().await;
    echoer.cancel().await;
}
