use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Dashboard,
    Applications,
    Jobs,
    SavedJobs,
    ResumeAnalysis,
}

impl Route {
    /// Entry pages an authenticated user has no business seeing.
    pub fn is_public_only(self) -> bool {
        matches!(self, Route::Landing | Route::Login | Route::Register)
    }

    pub fn is_protected(self) -> bool {
        !self.is_public_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Storage not read yet; render nothing.
    Pending,
    Render(Route),
    Redirect(Route),
}

pub fn resolve(route: Route, state: SessionState) -> Gate {
    match state {
        SessionState::Unknown => Gate::Pending,
        SessionState::Anonymous if route.is_protected() => Gate::Redirect(Route::Login),
        SessionState::Authenticated if route.is_public_only() => Gate::Redirect(Route::Dashboard),
        _ => Gate::Render(route),
    }
}
