//! Raw `AF_PACKET` frame capture, one blocking thread per monitored
//! interface. Kept out of `flowguard-core`: the core treats the capture
//! feed as opaque and only ever consumes the frames handed to it.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use flowguard_core::telemetry::PipelineMetrics;
use flowguard_core::PacketPipeline;
use tracing::{error, info, warn};

const ETH_P_ALL: u16 = 0x0003;
const CAPTURE_BUF_LEN: usize = 65536;

struct RawSocket(RawFd);

impl RawSocket {
    fn open(interface: &str) -> io::Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, ETH_P_ALL.to_be() as i32) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let socket = Self(fd);

        let ifindex = interface_index(interface)?;

        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = ETH_P_ALL.to_be();
        addr.sll_ifindex = ifindex;

        let ret = unsafe {
            libc::bind(
                socket.0,
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                mem::size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(socket)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::recv(self.0, buf.as_mut_ptr().cast(), buf.len(), 0) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

fn interface_index(name: &str) -> io::Result<i32> {
    let c_name = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
    let idx = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx as i32)
}

/// Spawns one capture thread per interface and returns immediately. Threads
/// run until the process exits or their socket errors out; there is no
/// cooperative shutdown signal since closing the capture fd on process exit
/// is sufficient (frames stop arriving once the XDP program is detached).
pub fn spawn_capture_threads(
    interfaces: &[String],
    pipeline: Arc<PacketPipeline>,
    metrics: Option<Arc<PipelineMetrics>>,
) {
    for interface in interfaces {
        let interface = interface.clone();
        let pipeline = Arc::clone(&pipeline);
        let metrics = metrics.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("capture-{interface}"))
            .spawn(move || run_capture_loop(&interface, &pipeline, metrics.as_deref()));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn capture thread");
        }
    }
}

fn run_capture_loop(interface: &str, pipeline: &PacketPipeline, metrics: Option<&PipelineMetrics>) {
    let socket = match RawSocket::open(interface) {
        Ok(s) => s,
        Err(e) => {
            error!(interface, error = %e, "failed to open capture socket");
            return;
        }
    };
    info!(interface, "capture started");

    let mut buf = vec![0u8; CAPTURE_BUF_LEN];
    loop {
        match socket.recv(&mut buf) {
            Ok(0) => continue,
            Ok(n) => pipeline.submit(buf[..n].to_vec(), metrics),
            Err(e) => warn!(interface, error = %e, "capture read error"),
        }
    }
}
