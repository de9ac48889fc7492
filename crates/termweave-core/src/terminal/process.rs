//! Terminal driver for the controlling tty of this process.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use libc::c_int;
use parking_lot::Mutex;
use signal_hook::iterator::Signals;

use super::{TerminalDriver, TerminalInput};
use crate::config::TerminalMode;
use crate::logging::targets;

/// How long the input thread waits in `poll` before rechecking its stop flag.
const INPUT_POLL_MS: c_int = 50;

/// Fallback size when the tty does not report one.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Termios to restore if the process panics while in managed mode.
///
/// Set while managed, cleared on a normal release.
static PANIC_RESTORE: Mutex<Option<(c_int, libc::termios)>> = Mutex::new(None);
static PANIC_HOOK: Once = Once::new();

fn get_termios(fd: c_int) -> io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_termios(fd: c_int, termios: &libc::termios) -> io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn read_winsize(fd: c_int) -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some((size.ws_col, size.ws_row))
    } else {
        None
    }
}

fn poll_readable(fd: c_int, timeout_ms: c_int) -> bool {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    result > 0 && (fds.revents & libc::POLLIN) != 0
}

fn write_all_fd(fd: c_int, data: &str) -> io::Result<()> {
    let mut bytes = data.as_bytes();
    while !bytes.is_empty() {
        let result = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if result == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
        }
        bytes = &bytes[result as usize..];
    }
    Ok(())
}

/// Escape sequences switching the features of `mode` on.
fn enter_sequence(mode: &TerminalMode) -> String {
    let mut seq = String::new();
    if mode.extended_keys {
        // Application cursor keys and keypad.
        seq.push_str("\x1b[?1h\x1b=");
    }
    if mode.mouse_tracking {
        // Button and drag reporting, SGR encoding.
        seq.push_str("\x1b[?1000h\x1b[?1002h\x1b[?1006h");
    }
    seq.push_str(if mode.cursor_visible {
        "\x1b[?25h"
    } else {
        "\x1b[?25l"
    });
    seq
}

/// Escape sequences undoing [`enter_sequence`].
fn leave_sequence(mode: &TerminalMode) -> String {
    let mut seq = String::new();
    if mode.mouse_tracking {
        seq.push_str("\x1b[?1006l\x1b[?1002l\x1b[?1000l");
    }
    if mode.extended_keys {
        seq.push_str("\x1b[?1l\x1b>");
    }
    seq.push_str("\x1b[?25h");
    seq
}

fn install_panic_restore() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some((fd, termios)) = PANIC_RESTORE.lock().take() {
                let _ = set_termios(fd, &termios);
                let _ = write_all_fd(libc::STDOUT_FILENO, "\x1b[?1006l\x1b[?1002l\x1b[?1000l\x1b[?25h");
            }
            previous(info);
        }));
    });
}

/// Drives the process's controlling terminal through termios and escape
/// sequences.
///
/// While managed, a reader thread forwards stdin bytes and a `SIGWINCH`
/// thread forwards size changes; [`read_input`](TerminalDriver::read_input)
/// receives from both.
pub struct ProcessTerminal {
    stdin_fd: c_int,
    stdout_fd: c_int,
    original_termios: Option<libc::termios>,
    mode: Option<TerminalMode>,
    input_tx: Sender<TerminalInput>,
    input_rx: Receiver<TerminalInput>,
    stop_flag: Arc<AtomicBool>,
    input_thread: Option<JoinHandle<()>>,
    resize_signal_handle: Option<signal_hook::iterator::Handle>,
    resize_thread: Option<JoinHandle<()>>,
}

impl ProcessTerminal {
    /// Create a driver for stdin/stdout. Nothing is changed until
    /// [`enter_managed_mode`](TerminalDriver::enter_managed_mode).
    pub fn new() -> Self {
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        Self {
            stdin_fd: libc::STDIN_FILENO,
            stdout_fd: libc::STDOUT_FILENO,
            original_termios: None,
            mode: None,
            input_tx,
            input_rx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            input_thread: None,
            resize_signal_handle: None,
            resize_thread: None,
        }
    }

    fn start_input_thread(&mut self) {
        let stdin_fd = self.stdin_fd;
        let stop_flag = Arc::clone(&self.stop_flag);
        let tx = self.input_tx.clone();

        self.input_thread = Some(thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            while !stop_flag.load(Ordering::SeqCst) {
                if !poll_readable(stdin_fd, INPUT_POLL_MS) {
                    continue;
                }
                let read_len =
                    unsafe { libc::read(stdin_fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len()) };
                if read_len <= 0 {
                    continue;
                }
                if tx
                    .send(TerminalInput::Bytes(buffer[..read_len as usize].to_vec()))
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    fn start_resize_thread(&mut self) -> io::Result<()> {
        let mut signals = Signals::new([libc::SIGWINCH])?;
        let handle = signals.handle();
        let stdout_fd = self.stdout_fd;
        let tx = self.input_tx.clone();

        self.resize_thread = Some(thread::spawn(move || {
            for _ in signals.forever() {
                let (width, height) = read_winsize(stdout_fd).unwrap_or(FALLBACK_SIZE);
                if tx.send(TerminalInput::Resize { width, height }).is_err() {
                    break;
                }
            }
        }));
        self.resize_signal_handle = Some(handle);
        Ok(())
    }

    fn stop_threads(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.input_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.resize_signal_handle.take() {
            handle.close();
        }
        if let Some(thread) = self.resize_thread.take() {
            let _ = thread.join();
        }
        while self.input_rx.try_recv().is_ok() {}
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalDriver for ProcessTerminal {
    fn enter_managed_mode(&mut self, mode: &TerminalMode) -> io::Result<()> {
        let original = get_termios(self.stdin_fd)?;
        let mut managed = original;
        if !mode.line_buffering {
            managed.c_lflag &= !libc::ICANON;
            managed.c_cc[libc::VMIN] = 1;
            managed.c_cc[libc::VTIME] = 0;
        }
        if !mode.echo {
            managed.c_lflag &= !libc::ECHO;
        }
        set_termios(self.stdin_fd, &managed)?;
        self.original_termios = Some(original);

        install_panic_restore();
        *PANIC_RESTORE.lock() = Some((self.stdin_fd, original));

        if let Err(err) = write_all_fd(self.stdout_fd, &enter_sequence(mode)) {
            let _ = set_termios(self.stdin_fd, &original);
            PANIC_RESTORE.lock().take();
            self.original_termios = None;
            return Err(err);
        }
        self.mode = Some(*mode);

        self.stop_flag.store(false, Ordering::SeqCst);
        if let Err(err) = self.start_resize_thread() {
            // The terminal is usable without resize notifications.
            tracing::warn!(target: targets::TERMINAL, %err, "failed to watch SIGWINCH");
        }
        self.start_input_thread();
        Ok(())
    }

    fn leave_managed_mode(&mut self) -> io::Result<()> {
        self.stop_threads();

        let mut result = Ok(());
        if let Some(mode) = self.mode.take() {
            result = write_all_fd(self.stdout_fd, &leave_sequence(&mode));
        }
        // Drop unread input so it does not leak to the shell.
        let _ = unsafe { libc::tcflush(self.stdin_fd, libc::TCIFLUSH) };
        if let Some(original) = self.original_termios.take() {
            set_termios(self.stdin_fd, &original)?;
        }
        PANIC_RESTORE.lock().take();
        result
    }

    fn dimensions(&self) -> (u16, u16) {
        read_winsize(self.stdout_fd).unwrap_or(FALLBACK_SIZE)
    }

    fn read_input(&mut self, timeout: Duration) -> Option<TerminalInput> {
        if timeout.is_zero() {
            return match self.input_rx.try_recv() {
                Ok(input) => Some(input),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            };
        }
        match self.input_rx.recv_timeout(timeout) {
            Ok(input) => Some(input),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
