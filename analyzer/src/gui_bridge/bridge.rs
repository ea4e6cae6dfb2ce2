use crate::generator::profile::{build_capture, GeneratorConfig};
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::Runner;
use anyhow::{anyhow, Context, Result};
use fhsscore::Capture;
use log::{error, info};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

fn gui_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

type SharedModel = Arc<RwLock<VisualizationModel>>;

fn store(state: &SharedModel, model: VisualizationModel) -> Result<()> {
    let mut guard = state
        .write()
        .map_err(|_| anyhow!("visualization state lock poisoned"))?;
    *guard = model;
    Ok(())
}

fn analyze_into(state: &SharedModel, runner: &Runner, capture: &Capture) -> Result<usize> {
    let result = runner.execute(capture)?;
    store(state, VisualizationModel::from(&result))?;
    Ok(result.detection_count())
}

/// Runs `analyze` on the blocking pool so a long grid fit does not hold up
/// the other routes.
async fn analyze_off_thread<F>(analyze: F) -> Result<usize>
where
    F: FnOnce() -> Result<usize> + Send + 'static,
{
    tokio::task::spawn_blocking(analyze)
        .await
        .context("analysis task did not complete")?
}

/// Holds the latest analysis for renderers. The HTTP endpoint only starts
/// when [`GuiBridge::serve`] is called.
pub struct GuiBridge {
    state: SharedModel,
}

impl Default for GuiBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl GuiBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
        }
    }

    /// Serves `GET /payload`, `POST /ingest` (capture JSON) and
    /// `POST /ingest-config` (generator config) on a background thread.
    pub fn serve(&self, runner: Arc<Runner>) -> Result<()> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building HTTP bridge runtime")?;

        let state_for_filter = self.state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner_filter = warp::any().map(move || runner.clone());

        let get_route = warp::path("payload")
            .and(warp::get())
            .and(state_filter.clone())
            .and_then(|state: SharedModel| async move {
                match state.read() {
                    Ok(guard) => Ok(warp::reply::json(&*guard)),
                    Err(_) => Err(warp::reject::custom(WarpError)),
                }
            });

        let post_route = warp::path("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(runner_filter.clone())
            .and_then(
                |capture: Capture, state: SharedModel, runner: Arc<Runner>| async move {
                    let analysis =
                        analyze_off_thread(move || analyze_into(&state, &runner, &capture));
                    match analysis.await {
                        Ok(carriers) => Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&json!({"status": "ok", "carriers": carriers})),
                            StatusCode::OK,
                        )),
                        Err(err) => {
                            error!("ingest error: {:#}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        let generator_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |config: GeneratorConfig, state: SharedModel, runner: Arc<Runner>| async move {
                    let description = config.description.clone().unwrap_or_default();
                    let analysis = analyze_off_thread(move || {
                        build_capture(&config)
                            .and_then(|capture| analyze_into(&state, &runner, &capture))
                    });
                    match analysis.await {
                        Ok(carriers) => Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&json!({
                                "status": "ok",
                                "carriers": carriers,
                                "description": description
                            })),
                            StatusCode::OK,
                        )),
                        Err(err) => {
                            error!("ingest-config error: {:#}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        let address = gui_bind_address();
        thread::spawn(move || {
            let routes = get_route.or(post_route).or(generator_route);
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        });
        info!("HTTP bridge listening on {}", address);
        Ok(())
    }

    pub fn publish(&self, model: &VisualizationModel) -> Result<()> {
        store(&self.state, model.clone())?;
        info!(
            "published {} curve points, {} carriers",
            model.curve.len(),
            model.carriers.len()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::WorkflowConfig;
    use fhsscore::FrequencyAxis;

    fn two_carrier_capture() -> Capture {
        let axis = FrequencyAxis::linspace(1.0, 5.0, 5).unwrap();
        let sweeps = vec![
            vec![-90.0, -10.0, -90.0, -90.0, -90.0],
            vec![-90.0, -90.0, -90.0, -10.0, -90.0],
        ];
        Capture::from_sweeps(axis, sweeps).unwrap()
    }

    #[test]
    fn gui_bridge_publishes_runner_result() {
        let runner = Runner::new(WorkflowConfig::default());
        let gui = GuiBridge::new();
        let result = runner.execute(&two_carrier_capture()).unwrap();
        gui.publish(&VisualizationModel::from(&result)).unwrap();

        let snapshot = gui.snapshot();
        assert_eq!(snapshot.carriers, vec![2.0, 4.0]);
        assert_eq!(snapshot.curve.len(), 5);
        assert_eq!(snapshot.hop_duration, Some(2.0));
        assert!(snapshot.grid.is_none());
    }

    #[test]
    fn analyze_into_replaces_state() {
        let runner = Runner::new(WorkflowConfig::default());
        let gui = GuiBridge::new();
        let carriers = analyze_into(&gui.state, &runner, &two_carrier_capture()).unwrap();
        assert_eq!(carriers, 2);
        assert_eq!(gui.snapshot().frequencies, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn off_thread_analysis_updates_shared_state() {
        let runner = Arc::new(Runner::new(WorkflowConfig::default()));
        let gui = GuiBridge::new();
        let state = gui.state.clone();
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();

        let carriers = runtime
            .block_on(analyze_off_thread(move || {
                analyze_into(&state, &runner, &two_carrier_capture())
            }))
            .unwrap();
        assert_eq!(carriers, 2);
        assert_eq!(gui.snapshot().carriers, vec![2.0, 4.0]);
    }

    #[test]
    fn off_thread_analysis_reports_failures() {
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        let err = runtime
            .block_on(analyze_off_thread(|| Err(anyhow!("no capture"))))
            .unwrap_err();
        assert!(err.to_string().contains("no capture"));
    }

    #[test]
    fn ingest_payload_parses_capture_json() {
        let json = serde_json::to_string(&two_carrier_capture()).unwrap();
        let capture: Capture = serde_json::from_str(&json).unwrap();
        assert_eq!(capture.sweep_count(), 2);
    }
}
