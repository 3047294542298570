use std::net::SocketAddr;

use log::info;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::error::{AppError, SocketStage};

/// Size of one toggle notification on the wire.
pub const PAYLOAD_LEN: usize = 2;

/// Formats a toggle value as its ASCII digit followed by a NUL terminator.
pub fn encode_toggle(value: u8) -> [u8; PAYLOAD_LEN] {
    let digit = if value == 0 { b'0' } else { b'1' };
    [digit, 0]
}

/// Inverse of [`encode_toggle`] for clients reading the stream.
pub fn parse_toggle(payload: &[u8; PAYLOAD_LEN]) -> Option<u8> {
    match payload {
        [b'0', 0] => Some(0),
        [b'1', 0] => Some(1),
        _ => None,
    }
}

pub async fn send_toggle<W>(conn: &mut W, value: u8) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    let payload = encode_toggle(value);
    conn.write_all(&payload)
        .await
        .map_err(|e| AppError::transport(SocketStage::Send, e))?;
    conn.flush()
        .await
        .map_err(|e| AppError::transport(SocketStage::Send, e))
}

/// A listening socket with room for exactly one client, accepted once.
pub struct NotificationChannel {
    listener: TcpListener,
    client: Option<(TcpStream, SocketAddr)>,
}

impl NotificationChannel {
    pub fn bind(addr: SocketAddr, backlog: u32) -> Result<Self, AppError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| AppError::transport(SocketStage::Socket, e))?;
        socket
            .bind(addr)
            .map_err(|e| AppError::transport(SocketStage::Bind, e))?;
        let listener = socket
            .listen(backlog)
            .map_err(|e| AppError::transport(SocketStage::Listen, e))?;

        Ok(Self {
            listener,
            client: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::transport(SocketStage::Socket, e))
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.client.as_ref().map(|(_, addr)| *addr)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Blocks until a client connects. Fails without accepting if the slot is taken.
    pub async fn accept(&mut self) -> Result<SocketAddr, AppError> {
        if let Some((_, peer)) = &self.client {
            return Err(AppError::transport(
                SocketStage::Accept,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("client {peer} already connected"),
                ),
            ));
        }

        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| AppError::transport(SocketStage::Accept, e))?;
        info!("Client connected from {peer}");
        self.client = Some((stream, peer));
        Ok(peer)
    }

    pub async fn send_toggle(&mut self, value: u8) -> Result<(), AppError> {
        let Some((stream, _)) = self.client.as_mut() else {
            return Err(AppError::transport(
                SocketStage::Send,
                std::io::ErrorKind::NotConnected.into(),
            ));
        };
        send_toggle(stream, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_digit_and_nul() {
        assert_eq!(encode_toggle(0), *b"0\0");
        assert_eq!(encode_toggle(1), *b"1\0");
    }

    #[test]
    fn parse_rejects_unterminated_payload() {
        assert_eq!(parse_toggle(b"1\0"), Some(1));
        assert_eq!(parse_toggle(b"1\n"), None);
        assert_eq!(parse_toggle(b"2\0"), None);
    }

    #[tokio::test]
    async fn send_toggle_writes_two_bytes() {
        let mut sink = Vec::new();
        send_toggle(&mut sink, 1).await.unwrap();
        send_toggle(&mut sink, 0).await.unwrap();
        assert_eq!(sink, b"1\00\0");
    }

    #[tokio::test]
    async fn send_without_client_is_not_connected() {
        let mut channel = NotificationChannel::bind("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let err = channel.send_toggle(1).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Transport {
                stage: SocketStage::Send,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn second_accept_is_refused() {
        let mut channel = NotificationChannel::bind("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let addr = channel.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        channel.accept().await.unwrap();
        assert!(channel.is_connected());

        let err = channel.accept().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Transport {
                stage: SocketStage::Accept,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bind_conflict_is_a_bind_error() {
        let first = NotificationChannel::bind("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let taken = first.local_addr().unwrap();
        let err = match NotificationChannel::bind(taken, 5) {
            Ok(_) => panic!("second bind to {taken} succeeded"),
            Err(e) => e,
        };
        assert!(err.to_string().starts_with("bind() error"));
    }
}
