// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email channel against a scripted in-process SMTP relay.

use std::net::SocketAddr;
use std::sync::Arc;

use lettre::{AsyncSmtpTransport, Tokio1Executor};
use nudge_core::{HealthStatus, Notification, NotificationChannel, NudgeError, PluginAdapter};
use nudge_email::EmailChannel;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A minimal relay: answers every command with 250 except `RCPT TO`,
/// which gets `rcpt_reply`. Captures the DATA payload.
async fn relay(rcpt_reply: &'static str) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let sink = sink.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                write.write_all(b"220 relay.test ESMTP\r\n").await.unwrap();

                let mut in_data = false;
                while let Ok(Some(line)) = lines.next_line().await {
                    if in_data {
                        if line == "." {
                            in_data = false;
                            write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                        } else {
                            sink.lock().await.push(line);
                        }
                        continue;
                    }
                    let verb = line.split_whitespace().next().unwrap_or("").to_uppercase();
                    let reply: &[u8] = match verb.as_str() {
                        "EHLO" | "HELO" => b"250 relay.test\r\n",
                        "RCPT" => rcpt_reply.as_bytes(),
                        "DATA" => {
                            in_data = true;
                            b"354 end with <CRLF>.<CRLF>\r\n"
                        }
                        "QUIT" => {
                            let _ = write.write_all(b"221 bye\r\n").await;
                            break;
                        }
                        _ => b"250 ok\r\n",
                    };
                    write.write_all(reply).await.unwrap();
                }
            });
        }
    });

    (addr, captured)
}

fn channel(addr: SocketAddr) -> EmailChannel {
    let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("127.0.0.1")
        .port(addr.port())
        .build();
    EmailChannel::from_transport(transport, "Nudge <reminders@example.com>".parse().unwrap())
}

fn notification() -> Notification {
    Notification {
        reminder_id: "r1".into(),
        subject: "Reminder: Renew domain".into(),
        body: "Renew the domain before it lapses.".into(),
    }
}

#[tokio::test]
async fn delivers_through_relay() {
    let (addr, captured) = relay("250 2.1.5 ok\r\n").await;

    let id = channel(addr)
        .send("ana@example.com", &notification())
        .await
        .unwrap();
    assert!(id.0.ends_with("@nudge>"));

    let data = captured.lock().await.join("\n");
    assert!(data.contains("Subject: Reminder: Renew domain"));
    assert!(data.contains("Renew the domain before it lapses."));
}

#[tokio::test]
async fn unknown_mailbox_is_permanent() {
    let (addr, _) = relay("550 5.1.1 no such user\r\n").await;

    let err = channel(addr)
        .send("ghost@example.com", &notification())
        .await
        .unwrap_err();
    assert!(matches!(err, NudgeError::DeliveryRejected { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn greylisting_is_transient() {
    let (addr, _) = relay("451 4.7.1 try again later\r\n").await;

    let err = channel(addr)
        .send("ana@example.com", &notification())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn unreachable_relay_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let channel = channel(addr);
    let err = channel
        .send("ana@example.com", &notification())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(
        channel.health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
}

#[tokio::test]
async fn health_probes_the_relay() {
    let (addr, _) = relay("250 ok\r\n").await;
    assert_eq!(channel(addr).health_check().await.unwrap(), HealthStatus::Healthy);
}
