use tracing::info;

use crate::{
    browser::fetch::Fetch,
    error::ApiResult,
    models::AccessTokenView,
    remote::{Remote, Ticket},
};

/// The logged-in user's access tokens.
///
/// A freshly created token's secret is kept until it has been shown once or
/// until the next completed list refresh, whichever comes first. Listed
/// entries never carry a secret.
#[derive(Debug, Default)]
pub struct TokenLedger {
    tokens: Remote<Vec<AccessTokenView>>,
    creating: Remote<AccessTokenView>,
    deleting: Remote<()>,
    revealed: Option<String>,
}

impl TokenLedger {
    pub fn tokens(&self) -> &Remote<Vec<AccessTokenView>> {
        &self.tokens
    }

    pub fn creating(&self) -> &Remote<AccessTokenView> {
        &self.creating
    }

    pub fn deleting(&self) -> &Remote<()> {
        &self.deleting
    }

    /// Whether an unshown secret is waiting.
    pub fn has_revealed(&self) -> bool {
        self.revealed.is_some()
    }

    /// Load the list unless it was already requested.
    pub fn ensure_loaded(&mut self) -> Option<Fetch> {
        self.tokens.ensure_started().map(Fetch::Tokens)
    }

    /// Reload the list.
    pub fn refresh(&mut self) -> Fetch {
        Fetch::Tokens(self.tokens.start())
    }

    pub fn create(&mut self) -> Fetch {
        Fetch::CreateToken(self.creating.start())
    }

    pub fn delete(&mut self, token_id: i64) -> Fetch {
        Fetch::DeleteToken(self.deleting.start(), token_id)
    }

    /// Hand out the one-time secret. Later calls return `None`.
    pub fn take_revealed(&mut self) -> Option<String> {
        self.revealed.take()
    }

    /// Forget everything, e.g. after logout.
    pub fn reset(&mut self) {
        self.tokens.reset();
        self.creating.reset();
        self.deleting.reset();
        self.revealed = None;
    }

    pub(crate) fn apply_list(&mut self, ticket: Ticket, result: ApiResult<Vec<AccessTokenView>>) {
        let result = result.map(|list| list.into_iter().map(AccessTokenView::redacted).collect());
        if self.tokens.resolve(ticket, result) {
            self.revealed = None;
        }
    }

    pub(crate) fn apply_created(
        &mut self,
        ticket: Ticket,
        result: ApiResult<AccessTokenView>,
    ) -> Vec<Fetch> {
        let secret = result.as_ref().ok().and_then(|t| t.token.clone());
        if let Ok(created) = &result {
            info!(token_id = created.id, partial = %created.token_partial, "access token created");
        }
        let succeeded = result.is_ok();
        if !self.creating.resolve(ticket, result.map(AccessTokenView::redacted)) || !succeeded {
            return Vec::new();
        }
        self.revealed = secret;
        vec![self.refresh()]
    }

    pub(crate) fn apply_deleted(&mut self, ticket: Ticket, result: ApiResult<()>) -> Vec<Fetch> {
        let ok = result.is_ok();
        if self.deleting.resolve(ticket, result) && ok {
            vec![self.refresh()]
        } else {
            Vec::new()
        }
    }
}
