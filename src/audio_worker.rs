//! Off-thread audio parameter mapping
//!
//! The worker thread receives [`AudioInput`] snapshots over a channel and sends back
//! [`AudioParams`]. It never sees a particle, so the simulation needs no locking.
//! Results are identical to calling [`map_audio`] on the simulation thread.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::sim::{AudioInput, AudioParams, map_audio, map_batch};
use crate::{Error, Result, Settings};

/// Parameters the worker maps with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerParams {
    pub base_frequency: f32,
    pub master_volume: f32,
    pub reverb_amount: f32,
}

impl Default for WorkerParams {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for WorkerParams {
    fn from(settings: &Settings) -> Self {
        Self {
            base_frequency: settings.base_frequency,
            master_volume: settings.master_volume,
            reverb_amount: settings.reverb_amount,
        }
    }
}

/// Messages to the worker
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Initialize(WorkerParams),
    UpdateParams(WorkerParams),
    Calculate(AudioInput),
    ProcessBatch(Vec<AudioInput>),
    GetStats,
    Shutdown,
}

/// Worker counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub calculations: u64,
    pub batches: u64,
    pub params: WorkerParams,
}

/// Messages from the worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Initialized(WorkerParams),
    ParamsUpdated(WorkerParams),
    Calculated(AudioParams),
    BatchProcessed(Vec<AudioParams>),
    Stats(WorkerStats),
}

/// Handle to a running audio worker thread
pub struct AudioWorker {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Start the worker thread
    pub fn spawn(params: WorkerParams) -> Self {
        let (req_tx, req_rx) = unbounded();
        let (resp_tx, resp_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || run(params, req_rx, resp_tx))
            .map_err(|err| log::warn!("failed to spawn audio worker thread: {err}"))
            .ok();
        Self {
            requests: req_tx,
            responses: resp_rx,
            handle,
        }
    }

    pub fn send(&self, request: WorkerRequest) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::WorkerDisconnected);
        }
        self.requests
            .send(request)
            .map_err(|_| Error::WorkerDisconnected)
    }

    /// Block until the next response
    pub fn recv(&self) -> Result<WorkerResponse> {
        self.responses.recv().map_err(|_| Error::WorkerDisconnected)
    }

    /// Next response if one is ready
    pub fn try_recv(&self) -> Option<WorkerResponse> {
        self.responses.try_recv().ok()
    }

    /// Map a batch and wait for the result
    pub fn process_batch(&self, inputs: Vec<AudioInput>) -> Result<Vec<AudioParams>> {
        self.send(WorkerRequest::ProcessBatch(inputs))?;
        loop {
            match self.recv()? {
                WorkerResponse::BatchProcessed(results) => return Ok(results),
                other => log::debug!("audio worker: skipping {other:?} while waiting for batch"),
            }
        }
    }

    pub fn stats(&self) -> Result<WorkerStats> {
        self.send(WorkerRequest::GetStats)?;
        loop {
            if let WorkerResponse::Stats(stats) = self.recv()? {
                return Ok(stats);
            }
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("audio worker panicked");
            }
        }
    }
}

fn run(mut params: WorkerParams, requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
    let mut stats = WorkerStats {
        calculations: 0,
        batches: 0,
        params,
    };
    log::debug!("audio worker started: {params:?}");

    for request in requests.iter() {
        let response = match request {
            WorkerRequest::Initialize(p) => {
                params = p;
                log::info!("audio worker initialized: {params:?}");
                WorkerResponse::Initialized(params)
            }
            WorkerRequest::UpdateParams(p) => {
                params = p;
                WorkerResponse::ParamsUpdated(params)
            }
            WorkerRequest::Calculate(input) => {
                stats.calculations += 1;
                WorkerResponse::Calculated(map_audio(&input, params.base_frequency))
            }
            WorkerRequest::ProcessBatch(inputs) => {
                stats.calculations += inputs.len() as u64;
                stats.batches += 1;
                WorkerResponse::BatchProcessed(map_batch(&inputs, params.base_frequency))
            }
            WorkerRequest::GetStats => {
                stats.params = params;
                WorkerResponse::Stats(stats)
            }
            WorkerRequest::Shutdown => break,
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    log::debug!("audio worker closing");
}
