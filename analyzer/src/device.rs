use anyhow::Context;
use fhsscore::capture::FrameDecoder;
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Raw scan bytes plus how long the device took to deliver them.
pub struct RawScan {
    pub bytes: Vec<u8>,
    pub elapsed: Duration,
}

/// Line-command link to a sweeping scanner. Every command is terminated by
/// a carriage return and answered with one echoed line, which is dropped.
pub struct ScannerLink<T: Read + Write> {
    port: T,
}

impl ScannerLink<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path_ref)
            .with_context(|| format!("opening scanner device {}", path_ref.display()))?;
        Ok(Self::new(port))
    }
}

impl<T: Read + Write> ScannerLink<T> {
    pub fn new(port: T) -> Self {
        Self { port }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> T {
        self.port
    }

    pub fn command(&mut self, line: &str) -> anyhow::Result<()> {
        debug!("scanner <- {}", line);
        self.port
            .write_all(format!("{}\r", line).as_bytes())
            .and_then(|_| self.port.flush())
            .with_context(|| format!("sending scanner command '{}'", line))?;
        let echo = self.read_line()?;
        debug!("scanner -> {}", echo.trim_end());
        Ok(())
    }

    fn read_line(&mut self) -> anyhow::Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("reading scanner echo"),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    pub fn set_sweep_mode(&mut self, mode: &str) -> anyhow::Result<()> {
        self.command(&format!("sweep {}", mode))
    }

    pub fn set_spur_removal(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.command(if enabled { "spur on" } else { "spur off" })
    }

    pub fn abort(&mut self, arg: Option<&str>) -> anyhow::Result<()> {
        match arg {
            Some(arg) => self.command(&format!("abort {}", arg)),
            None => self.command("abort"),
        }
    }

    pub fn resume(&mut self) -> anyhow::Result<()> {
        self.command("resume")
    }

    /// Enables scan aborts; fast mode also disables spur removal and
    /// switches the sweep to its fast setting.
    pub fn prepare(&mut self, fast: bool) -> anyhow::Result<()> {
        self.abort(Some("on"))?;
        if fast {
            self.set_spur_removal(false)?;
            self.set_sweep_mode("fast")?;
        }
        Ok(())
    }

    /// Runs a raw scan of `sweeps` frames over `points` bins, then aborts
    /// and resumes normal operation. Stops early if the device goes quiet.
    pub fn capture_raw(
        &mut self,
        start: f64,
        stop: f64,
        points: usize,
        sweeps: usize,
    ) -> anyhow::Result<RawScan> {
        let frame_size = FrameDecoder::new(points)
            .context("sizing raw scan frames")?
            .frame_size();
        let expected = frame_size
            .checked_mul(sweeps)
            .context("overflow computing raw scan size")?;

        let started = Instant::now();
        self.command(&format!("scanraw {:.0} {:.0} {} 3", start, stop, points))?;

        let mut bytes = Vec::with_capacity(expected);
        let mut chunk = vec![0u8; frame_size];
        while bytes.len() < expected {
            let wanted = (expected - bytes.len()).min(chunk.len());
            match self.port.read(&mut chunk[..wanted]) {
                Ok(0) => break,
                Ok(read) => bytes.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("reading raw scan"),
            }
        }
        let elapsed = started.elapsed();

        self.abort(None)?;
        self.resume()?;
        info!(
            "raw scan delivered {} of {} bytes in {:.3} s",
            bytes.len(),
            expected,
            elapsed.as_secs_f64()
        );
        Ok(RawScan { bytes, elapsed })
    }
}
