use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use rota_engine::config::OptimizerConfig;
use rota_engine::model::SchedulingProblem;
use rota_engine::solver::Optimizer;
use rota_engine::validator;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum Request {
    Optimize {
        problem: SchedulingProblem,
        #[serde(default)]
        options: OptimizerConfig,
    },
    Validate {
        problem: SchedulingProblem,
    },
    /// Score a fixed assignment instead of optimizing.
    Evaluate {
        problem: SchedulingProblem,
        /// Nurse id -> shift ids (`"{date}_{type}"`).
        assignments: BTreeMap<String, Vec<String>>,
        #[serde(default)]
        options: OptimizerConfig,
    },
}

#[derive(Debug, Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrResponse {
    ok: bool,
    error: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Logs go to stderr so stdout carries only the JSON response.
/// `RUST_LOG` overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .try_init();
}

fn write_ok<T: Serialize>(data: T) {
    let resp = OkResponse { ok: true, data };
    let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
        format!("{{\"ok\":false,\"error\":\"serialization error: {}\"}}", e)
    });
    println!("{}", json);
    let _ = io::stdout().flush();
}

fn write_err(msg: impl std::fmt::Display) -> ! {
    let resp = ErrResponse {
        ok: false,
        error: msg.to_string(),
    };
    let json = serde_json::to_string(&resp).unwrap_or_else(|_| {
        "{\"ok\":false,\"error\":\"double serialization error\"}".to_string()
    });
    println!("{}", json);
    let _ = io::stdout().flush();
    std::process::exit(1);
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    init_logging();

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        write_err(format!("Failed to read stdin: {}", e));
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => write_err(format!("Invalid JSON input: {}", e)),
    };

    match request {
        Request::Optimize { problem, options } => {
            match Optimizer::new(options).optimize(&problem) {
                Ok(outcome) => write_ok(outcome),
                Err(e) => write_err(e),
            }
        }
        Request::Validate { problem } => {
            write_ok(validator::validate(&problem));
        }
        Request::Evaluate {
            problem,
            assignments,
            options,
        } => match Optimizer::new(options).evaluate(&problem, &assignments) {
            Ok(report) => write_ok(report),
            Err(e) => write_err(e),
        },
    }
}
