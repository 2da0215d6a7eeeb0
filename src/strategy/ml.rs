//! Model-based detector strategy
//!
//! The model is loaded lazily on a background thread the first time the
//! arbiter initializes the strategy. Until the loader reports back the
//! strategy stays `Initializing` and the arbiter moves on to the next one.
//! Any load failure permanently disables the strategy for the session.
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use super::{DecodeStrategy, InitProgress};
use crate::camera::FrameHandle;
use crate::error::{DecodeFrameError, StrategyInitError};
use crate::types::{BarcodeFormat, DecodeResult, StrategyKind};

/// One model output
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub format: BarcodeFormat,
    /// Model score in 0.0..=1.0
    pub confidence: f32,
}

/// A loaded model ready for inference
pub trait InferenceModel: Send {
    fn infer(&mut self, frame: &FrameHandle) -> Result<Vec<Candidate>, String>;
}

/// Fetches and prepares a model; runs on a background thread
pub trait ModelLoader: Send + 'static {
    /// Whether the accelerator the model needs is present
    fn gpu_available(&self) -> bool;

    fn load(self: Box<Self>) -> Result<Box<dyn InferenceModel>, String>;
}

type LoadResult = Result<Box<dyn InferenceModel>, String>;

enum Stage {
    NotStarted(Box<dyn ModelLoader>),
    Loading(Receiver<LoadResult>),
    Loaded(Box<dyn InferenceModel>),
    Disabled,
}

pub struct MlStrategy {
    stage: Stage,
    min_confidence: f32,
}

impl MlStrategy {
    pub fn new(loader: Box<dyn ModelLoader>, min_confidence: f32) -> Self {
        Self {
            stage: Stage::NotStarted(loader),
            min_confidence,
        }
    }

    fn best_candidate(&self, candidates: Vec<Candidate>) -> Option<Candidate> {
        candidates
            .into_iter()
            .filter(|c| c.confidence >= self.min_confidence && !c.text.is_empty())
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

impl DecodeStrategy for MlStrategy {
    fn name(&self) -> &'static str {
        "ml"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Ml
    }

    fn initialize(&mut self) -> Result<InitProgress, StrategyInitError> {
        let loader = match std::mem::replace(&mut self.stage, Stage::Disabled) {
            Stage::NotStarted(loader) => loader,
            Stage::Loaded(model) => {
                self.stage = Stage::Loaded(model);
                return Ok(InitProgress::Ready);
            }
            Stage::Loading(rx) => {
                self.stage = Stage::Loading(rx);
                return Ok(InitProgress::Pending);
            }
            Stage::Disabled => {
                return Err(StrategyInitError::Failed("model loader already consumed".into()))
            }
        };

        if !loader.gpu_available() {
            return Err(StrategyInitError::Unavailable("no GPU available".into()));
        }

        let (tx, rx) = bounded(1);
        thread::Builder::new()
            .name("ml-model-loader".into())
            .spawn(move || {
                let result = loader.load();
                // Receiver is gone if the session ended first; result is discarded
                let _ = tx.send(result);
            })
            .map_err(|e| StrategyInitError::Failed(format!("failed to spawn loader: {e}")))?;

        tracing::info!("ML model loading in background");
        self.stage = Stage::Loading(rx);
        Ok(InitProgress::Pending)
    }

    fn poll_initialized(&mut self) -> Result<InitProgress, StrategyInitError> {
        let Stage::Loading(rx) = &self.stage else {
            return match self.stage {
                Stage::Loaded(_) => Ok(InitProgress::Ready),
                _ => Err(StrategyInitError::Failed("model not loading".into())),
            };
        };

        match rx.try_recv() {
            Ok(Ok(model)) => {
                tracing::info!("✓ ML model loaded");
                self.stage = Stage::Loaded(model);
                Ok(InitProgress::Ready)
            }
            Ok(Err(reason)) => {
                self.stage = Stage::Disabled;
                Err(StrategyInitError::Failed(reason))
            }
            Err(TryRecvError::Empty) => Ok(InitProgress::Pending),
            Err(TryRecvError::Disconnected) => {
                self.stage = Stage::Disabled;
                Err(StrategyInitError::Failed("model loader exited without a result".into()))
            }
        }
    }

    fn detect(&mut self, frame: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError> {
        let Stage::Loaded(model) = &mut self.stage else {
            return Ok(None);
        };

        let candidates = model.infer(frame).map_err(DecodeFrameError)?;
        Ok(self
            .best_candidate(candidates)
            .map(|c| DecodeResult::new(c.text, c.format, "ml")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use image::RgbaImage;

    struct FixedModel(Vec<Candidate>);

    impl InferenceModel for FixedModel {
        fn infer(&mut self, _frame: &FrameHandle) -> Result<Vec<Candidate>, String> {
            Ok(self.0.clone())
        }
    }

    /// Loader that blocks until the test releases it
    struct GatedLoader {
        gpu: bool,
        gate: Receiver<Result<Vec<Candidate>, String>>,
    }

    impl ModelLoader for GatedLoader {
        fn gpu_available(&self) -> bool {
            self.gpu
        }
        fn load(self: Box<Self>) -> Result<Box<dyn InferenceModel>, String> {
            let candidates = self.gate.recv().map_err(|e| e.to_string())??;
            Ok(Box::new(FixedModel(candidates)))
        }
    }

    fn gated(gpu: bool) -> (MlStrategy, Sender<Result<Vec<Candidate>, String>>) {
        let (tx, rx) = bounded(1);
        let strategy = MlStrategy::new(Box::new(GatedLoader { gpu, gate: rx }), 0.5);
        (strategy, tx)
    }

    fn wait_ready(strategy: &mut MlStrategy) -> Result<InitProgress, StrategyInitError> {
        for _ in 0..200 {
            match strategy.poll_initialized() {
                Ok(InitProgress::Pending) => thread::sleep(std::time::Duration::from_millis(5)),
                other => return other,
            }
        }
        Ok(InitProgress::Pending)
    }

    fn frame() -> FrameHandle {
        FrameHandle::new(RgbaImage::new(4, 4), 0, 1)
    }

    #[test]
    fn test_no_gpu_is_unavailable() {
        let (mut strategy, _tx) = gated(false);
        assert!(matches!(
            strategy.initialize(),
            Err(StrategyInitError::Unavailable(_))
        ));
    }

    #[test]
    fn test_pending_until_loaded() {
        let (mut strategy, tx) = gated(true);
        assert_eq!(strategy.initialize(), Ok(InitProgress::Pending));
        assert_eq!(strategy.poll_initialized(), Ok(InitProgress::Pending));
        assert_eq!(strategy.detect(&frame()).unwrap(), None);

        tx.send(Ok(vec![
            Candidate {
                text: "low".into(),
                format: BarcodeFormat::Qr,
                confidence: 0.2,
            },
            Candidate {
                text: "8901030895146".into(),
                format: BarcodeFormat::Ean13,
                confidence: 0.9,
            },
        ]))
        .unwrap();

        assert_eq!(wait_ready(&mut strategy), Ok(InitProgress::Ready));
        let result = strategy.detect(&frame()).unwrap().unwrap();
        assert_eq!(result.text, "8901030895146");
        assert_eq!(result.strategy_used, "ml");
    }

    #[test]
    fn test_load_failure_is_permanent() {
        let (mut strategy, tx) = gated(true);
        strategy.initialize().unwrap();
        tx.send(Err("model fetch blocked".into())).unwrap();

        assert_eq!(
            wait_ready(&mut strategy),
            Err(StrategyInitError::Failed("model fetch blocked".into()))
        );
        assert!(strategy.initialize().is_err());
        assert_eq!(strategy.detect(&frame()).unwrap(), None);
    }
}
