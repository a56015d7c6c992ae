//! Session bootstrap: open the three channel sockets against the peer's
//! abstract-namespace listening endpoint, write each channel's 1-byte
//! marker, and write the video channel's fixed-width codec header.

use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustix::net::{self, AddressFamily, SocketAddrUnix, SocketType};

use crate::error::{ExitCode, Fatal};

const VIDEO_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Video,
    Audio,
    Control,
}

impl Channel {
    fn marker(self) -> u8 {
        match self {
            Self::Video => b'V',
            Self::Audio => b'A',
            Self::Control => b'C',
        }
    }
}

fn connect_abstract(socket_name: &str) -> io::Result<UnixStream> {
    let fd = net::socket(AddressFamily::UNIX, SocketType::STREAM, None)?;
    let addr = SocketAddrUnix::new_abstract_name(socket_name.as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "socket name too long"))?;
    net::connect_unix(&fd, &addr)?;
    Ok(UnixStream::from(fd))
}

/// Opens one channel: connects, then writes the 1-byte marker (and, for the
/// video channel, the 20-byte space-padded codec name header).
fn open_channel(socket_name: &str, channel: Channel, codec_short_name: &str) -> Result<UnixStream, Fatal> {
    let mut stream = connect_abstract(socket_name)
        .map_err(|e| Fatal::new(ExitCode::SocketConnect, format!("connecting {channel:?} channel: {e}")))?;

    stream
        .write_all(&[channel.marker()])
        .map_err(|e| Fatal::new(ExitCode::SocketIo, format!("writing {channel:?} marker: {e}")))?;

    if channel == Channel::Video {
        let mut header = [b' '; VIDEO_HEADER_LEN];
        let bytes = codec_short_name.as_bytes();
        let n = bytes.len().min(VIDEO_HEADER_LEN);
        header[..n].copy_from_slice(&bytes[..n]);
        stream
            .write_all(&header)
            .map_err(|e| Fatal::new(ExitCode::SocketIo, format!("writing video codec header: {e}")))?;
    }

    Ok(stream)
}

pub struct SessionSockets {
    pub video: SharedSocket,
    pub audio: UnixStream,
    pub control: UnixStream,
}

/// Opens all three channels in order (video, audio, control) against the
/// same peer endpoint.
pub fn bootstrap(socket_name: &str, codec_short_name: &str) -> Result<SessionSockets, Fatal> {
    let video = open_channel(socket_name, Channel::Video, codec_short_name)?;
    let audio = open_channel(socket_name, Channel::Audio, codec_short_name)?;
    let control = open_channel(socket_name, Channel::Control, codec_short_name)?;
    Ok(SessionSockets {
        video: SharedSocket::new(video),
        audio,
        control,
    })
}

/// Sets a receive timeout on `stream`; `None` clears it (blocks forever).
pub fn set_read_timeout(stream: &UnixStream, timeout: Option<Duration>) -> io::Result<()> {
    stream.set_read_timeout(timeout)
}

/// A `Write` implementation shared between every active display's
/// streamer. All streamers write to the same underlying video socket file
/// descriptor; wrapping it in a mutex that `write_all` holds for the whole
/// call guarantees one packet's header-plus-payload never interleaves with
/// another streamer's write, without the streamer threads needing to know
/// about each other.
#[derive(Clone)]
pub struct SharedSocket(Arc<Mutex<UnixStream>>);

impl SharedSocket {
    #[must_use]
    pub fn new(stream: UnixStream) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    #[cfg(test)]
    #[must_use]
    pub fn new_for_test() -> Self {
        let (a, _b) = UnixStream::pair().expect("creating unix socket pair for test");
        Self::new(a)
    }
}

impl Write for SharedSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.lock().unwrap().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}
