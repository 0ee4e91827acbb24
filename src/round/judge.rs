//! LLM 裁判：多人并列最少票时，额外发起一次结构化生成调用，只挑一人吃 strike

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::GameError;
use crate::game::{JudgeVerdict, Round};
use crate::llm::RetryingLlmClient;
use crate::round::prompts::{judge_request, VoteReply};
use crate::round::resolution::TieBreaker;

/// 裁判选了并列集合以外的人时使用的理由
pub const JUDGE_FALLBACK_JUSTIFICATION: &str =
    "The judge named nobody from the tie; the first tied contestant takes the strike.";

pub struct LlmJudge {
    client: RetryingLlmClient,
}

impl LlmJudge {
    pub fn new(client: RetryingLlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TieBreaker for LlmJudge {
    async fn break_tie(
        &self,
        round: &Round,
        tied: &[String],
        cancel: &CancellationToken,
    ) -> Result<JudgeVerdict, GameError> {
        let first = tied
            .first()
            .cloned()
            .ok_or_else(|| GameError::state("judge called without tied agents"))?;

        let reply: VoteReply = self
            .client
            .generate_structured(&judge_request(round, tied), cancel)
            .await?;

        let pick = reply.vote_for.trim();
        let verdict = if tied.iter().any(|id| id == pick) {
            JudgeVerdict {
                tied: tied.to_vec(),
                target_id: pick.to_string(),
                justification: reply.justification,
            }
        } else {
            tracing::debug!(pick, "judge pick outside the tie, using first tied agent");
            JudgeVerdict {
                tied: tied.to_vec(),
                target_id: first,
                justification: JUDGE_FALLBACK_JUSTIFICATION.to_string(),
            }
        };

        tracing::info!(
            round = round.index,
            target = %verdict.target_id,
            tied = tied.len(),
            "judge broke the tie"
        );
        Ok(verdict)
    }
}
