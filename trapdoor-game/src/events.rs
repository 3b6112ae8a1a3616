use crate::game::RoundState;
use crate::side::Side;
use serde::{Deserialize, Serialize};
use trapdoor_core::{Amount, RequestToken};
use uuid::Uuid;

/// Domain events appended by the engine, observable by the host. The engine
/// never reads them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    StateChanged {
        state: RoundState,
    },
    ChoiceMade {
        participant: Uuid,
        side: Side,
        payment: Amount,
    },
    RandomnessRequested {
        token: RequestToken,
    },
    TrapdoorOpened {
        side: Side,
    },
    WinnersChosen {
        winners: Vec<Uuid>,
    },
}
