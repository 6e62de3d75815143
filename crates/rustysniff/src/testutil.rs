//! Scripted in-memory HCI transport for tests

use crate::hci::abi::{HciBindAddr, HciDevInfo, HciDevReq};
use crate::hci::{HciTransport, RecvMsg, TransportProvider};
use libc::c_int;
use std::collections::VecDeque;
use std::io::{self, IoSliceMut};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the next `recv_msg` call does
pub(crate) enum RecvStep {
    Datagram { data: Vec<u8>, control: Vec<u8> },
    Error(i32),
    /// Sets the flag, then fails with `EINTR` like a signal arriving mid-wait
    InterruptAndBreak(Arc<AtomicBool>),
}

#[derive(Default)]
pub(crate) struct MockState {
    pub opened: usize,
    pub closed: usize,
    pub binds: Vec<HciBindAddr>,
    pub options: Vec<(c_int, c_int, Vec<u8>)>,
    pub recv_script: VecDeque<RecvStep>,
    pub recv_calls: usize,
    pub devices: Vec<HciDevReq>,
    pub device_list_error: Option<i32>,
    pub info_script: VecDeque<Result<HciDevInfo, i32>>,
    pub info_queries: Vec<u16>,
    pub fail_option: Option<(c_int, c_int, i32)>,
    pub fail_bind: Option<i32>,
}

pub(crate) struct MockProvider {
    state: Arc<Mutex<MockState>>,
    release: Option<String>,
    open_error: Option<i32>,
}

impl MockProvider {
    pub fn new(release: Option<&str>) -> Self {
        MockProvider {
            state: Arc::new(Mutex::new(MockState::default())),
            release: release.map(str::to_owned),
            open_error: None,
        }
    }

    pub fn failing_open(errno: i32) -> Self {
        MockProvider {
            open_error: Some(errno),
            ..Self::new(Some("6.8.0"))
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn push_datagram(&self, data: &[u8], control: Vec<u8>) {
        self.state().recv_script.push_back(RecvStep::Datagram {
            data: data.to_vec(),
            control,
        });
    }

    pub fn push_step(&self, step: RecvStep) {
        self.state().recv_script.push_back(step);
    }
}

impl TransportProvider for MockProvider {
    fn open(&self) -> io::Result<Box<dyn HciTransport>> {
        if let Some(errno) = self.open_error {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.state().opened += 1;
        Ok(Box::new(MockSocket {
            state: Arc::clone(&self.state),
        }))
    }

    fn kernel_release(&self) -> Option<String> {
        self.release.clone()
    }
}

struct MockSocket {
    state: Arc<Mutex<MockState>>,
}

impl MockSocket {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed += 1;
        }
    }
}

impl HciTransport for MockSocket {
    fn raw_fd(&self) -> RawFd {
        -1
    }

    fn bind(&mut self, addr: &HciBindAddr) -> io::Result<()> {
        let mut state = self.state();
        if let Some(errno) = state.fail_bind {
            return Err(io::Error::from_raw_os_error(errno));
        }
        state.binds.push(*addr);
        Ok(())
    }

    fn set_option(&mut self, level: c_int, name: c_int, value: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if let Some((l, n, errno)) = state.fail_option {
            if l == level && n == name {
                return Err(io::Error::from_raw_os_error(errno));
            }
        }
        state.options.push((level, name, value.to_vec()));
        Ok(())
    }

    fn recv_msg(&mut self, bufs: &mut [IoSliceMut<'_>], control: &mut [u8]) -> io::Result<RecvMsg> {
        let step = {
            let mut state = self.state();
            state.recv_calls += 1;
            state.recv_script.pop_front()
        };
        match step {
            None => Err(io::Error::from_raw_os_error(libc::EAGAIN)),
            Some(RecvStep::Error(errno)) => Err(io::Error::from_raw_os_error(errno)),
            Some(RecvStep::InterruptAndBreak(flag)) => {
                flag.store(true, Ordering::Release);
                Err(io::Error::from_raw_os_error(libc::EINTR))
            }
            Some(RecvStep::Datagram { data, control: cmsgs }) => {
                let mut copied = 0;
                for buf in bufs.iter_mut() {
                    let n = (data.len() - copied).min(buf.len());
                    buf[..n].copy_from_slice(&data[copied..copied + n]);
                    copied += n;
                }
                let control_len = cmsgs.len().min(control.len());
                control[..control_len].copy_from_slice(&cmsgs[..control_len]);
                Ok(RecvMsg {
                    bytes: copied,
                    control_len,
                })
            }
        }
    }

    fn device_list(&mut self) -> io::Result<Vec<HciDevReq>> {
        let state = self.state();
        match state.device_list_error {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(state.devices.clone()),
        }
    }

    fn device_info(&mut self, dev_id: u16) -> io::Result<HciDevInfo> {
        let mut state = self.state();
        state.info_queries.push(dev_id);
        match state.info_script.pop_front() {
            Some(Ok(info)) => Ok(info),
            Some(Err(errno)) => Err(io::Error::from_raw_os_error(errno)),
            None => Err(io::Error::from_raw_os_error(libc::ENODEV)),
        }
    }
}
