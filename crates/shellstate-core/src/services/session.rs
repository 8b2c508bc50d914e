//! Session actions (logout, suspend, reboot, shutdown).

use std::{sync::Arc, time::Duration};

use log::info;
use masterror::{AppError, AppResult};
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::session::SessionAction,
};

#[derive(Clone)]
pub struct SessionService {
    runner: Arc<dyn CommandRunner>,
}

impl SessionService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn execute(&self, action: SessionAction) -> AppResult<()> {
        info!("session action: {}", action.label());
        let request =
            CommandRequest::new(action.command()).timeout(Duration::from_secs(10));

        self.runner
            .run(request)
            .await
            .map(|_| ())
            .map_err(|err| AppError::internal(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::test_utils::FakeRunner;

    #[test]
    fn actions_dispatch_their_commands() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("systemctl", "");
        runner.respond("hyprctl", "");

        let service = SessionService::new(Arc::clone(&runner) as Arc<dyn CommandRunner>);
        for action in SessionAction::ALL {
            runtime
                .block_on(service.execute(action))
                .expect("action should dispatch");
        }

        let calls = runner.calls();
        assert!(calls.iter().any(|call| call.contains("hyprctl dispatch exit")));
        assert!(calls.iter().any(|call| call.contains("systemctl suspend")));
        assert!(calls.iter().any(|call| call.contains("systemctl reboot")));
        assert!(calls.iter().any(|call| call.contains("systemctl poweroff")));
    }

    #[test]
    fn failures_surface() {
        let runtime = Runtime::new().expect("runtime");
        let service = SessionService::new(Arc::new(FakeRunner::new()));
        assert!(
            runtime
                .block_on(service.execute(SessionAction::Reboot))
                .is_err()
        );
    }
}
