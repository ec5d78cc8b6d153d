//! Route definitions for the client-signed transaction protocol.

use axum::routing::post;
use axum::Router;

use crate::handlers::chain;
use crate::state::AppState;

/// Root-level chain routes.
///
/// ```text
/// POST /buildUnsignedTx     -> build_unsigned_tx
/// POST /assembleTx          -> assemble_tx
/// POST /submitTx            -> submit_tx
/// POST /attachOnChainProof  -> attach_on_chain_proof
/// POST /abandonTx           -> abandon_tx
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buildUnsignedTx", post(chain::build_unsigned_tx))
        .route("/assembleTx", post(chain::assemble_tx))
        .route("/submitTx", post(chain::submit_tx))
        .route("/attachOnChainProof", post(chain::attach_on_chain_proof))
        .route("/abandonTx", post(chain::abandon_tx))
}
