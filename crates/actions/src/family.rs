//! Each [`ActionFamily`] is registered as one [`ActionSet`].

use async_trait::async_trait;
use repobot_core::action::{ActionOutcome, ActionRequest, ActionSchema, ActionSet};
use repobot_core::host::OperationContext;
use tracing::warn;

use crate::action::GithubAction;
use crate::catalog::ActionFamily;

#[async_trait]
impl ActionSet for ActionFamily {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn schemas(&self) -> Vec<ActionSchema> {
        ActionFamily::schemas(self)
    }

    async fn invoke(&self, ctx: &OperationContext, request: &ActionRequest) -> ActionOutcome {
        let action = match GithubAction::parse(request) {
            Ok(action) => action,
            Err(message) => {
                warn!(action = %request.name, error = %message, "Rejected action arguments");
                return ActionOutcome::failed(message);
            }
        };
        if action.family() != *self {
            return ActionOutcome::failed(format!(
                "Action '{}' is not handled by the {} family",
                action.name(),
                self
            ));
        }
        action.execute(ctx).await
    }
}
