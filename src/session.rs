use crate::error::{ClientError, ClientResult};
use tracing::debug;

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub email: String,
}

impl Session {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}

/// Bottom-bar destinations once logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    List,
    Favorites,
    Profile,
    MyAds,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Login,
    SignUp,
    Home(Tab),
    /// Listing detail, remembering which tab it was opened from
    Detail { listing_id: i64, from: Tab },
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Login => "Connexion",
            Screen::SignUp => "Inscription",
            Screen::Home(Tab::List) => "Tous les logements",
            Screen::Home(Tab::Favorites) => "Mes favoris",
            Screen::Home(Tab::Profile) => "Mon profil",
            Screen::Home(Tab::MyAds) => "Mes annonces",
            Screen::Detail { .. } => "Détails",
        }
    }
}

/// Requested navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nav {
    ShowSignUp,
    ShowLogin,
    LoggedIn(Session),
    Open(Tab),
    OpenDetail(i64),
    Back,
    Logout,
}

/// Single owner of the current screen and session.
#[derive(Debug)]
pub struct Router {
    screen: Screen,
    session: Option<Session>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            screen: Screen::Login,
            session: None,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn require_session(&self) -> ClientResult<&Session> {
        self.session.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    /// Move to the next screen. Moves the current screen does not offer are
    /// rejected and leave the router untouched.
    pub fn transition(&mut self, nav: Nav) -> ClientResult<&Screen> {
        let next = match (&self.screen, nav) {
            (Screen::Login, Nav::ShowSignUp) => Screen::SignUp,
            (Screen::SignUp, Nav::ShowLogin) => Screen::Login,
            (Screen::Login, Nav::LoggedIn(session)) => {
                self.session = Some(session);
                Screen::Home(Tab::List)
            }
            (Screen::Home(_), Nav::Open(tab)) => Screen::Home(tab),
            (Screen::Home(from @ (Tab::List | Tab::Favorites | Tab::MyAds)), Nav::OpenDetail(listing_id)) => {
                Screen::Detail {
                    listing_id,
                    from: *from,
                }
            }
            (Screen::Home(Tab::MyAds), Nav::Back) => Screen::Home(Tab::List),
            (Screen::Detail { from, .. }, Nav::Back) => Screen::Home(*from),
            (Screen::Home(_), Nav::Logout) => {
                self.session = None;
                Screen::Login
            }
            (screen, nav) => {
                debug!("Rejected {:?} from {:?}", nav, screen);
                return Err(ClientError::InvalidNavigation);
            }
        };
        debug!("Navigated to {:?}", next);
        self.screen = next;
        Ok(&self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn logged_in() -> Router {
        let mut router = Router::new();
        router
            .transition(Nav::LoggedIn(Session::new("amine", "a@x.dz")))
            .unwrap();
        router
    }

    #[test]
    fn starts_at_login_without_session() {
        let router = Router::new();
        assert_eq!(router.screen(), &Screen::Login);
        assert!(matches!(router.require_session(), Err(ClientError::NotLoggedIn)));
    }

    #[test]
    fn login_and_signup_toggle() {
        let mut router = Router::new();
        router.transition(Nav::ShowSignUp).unwrap();
        assert_eq!(router.screen(), &Screen::SignUp);
        router.transition(Nav::ShowLogin).unwrap();
        assert_eq!(router.screen(), &Screen::Login);
    }

    #[test]
    fn login_lands_on_list_with_session() {
        let router = logged_in();
        assert_eq!(router.screen(), &Screen::Home(Tab::List));
        assert_eq!(router.require_session().unwrap().username, "amine");
    }

    #[test]
    fn back_from_detail_returns_to_origin() {
        let mut router = logged_in();
        router.transition(Nav::Open(Tab::Favorites)).unwrap();
        router.transition(Nav::OpenDetail(51)).unwrap();
        assert_eq!(
            router.screen(),
            &Screen::Detail { listing_id: 51, from: Tab::Favorites }
        );
        router.transition(Nav::Back).unwrap();
        assert_eq!(router.screen(), &Screen::Home(Tab::Favorites));
    }

    #[test]
    fn back_from_my_ads_goes_to_list() {
        let mut router = logged_in();
        router.transition(Nav::Open(Tab::MyAds)).unwrap();
        router.transition(Nav::Back).unwrap();
        assert_eq!(router.screen(), &Screen::Home(Tab::List));
    }

    #[test]
    fn illegal_moves_leave_state_unchanged() {
        let mut router = Router::new();
        assert!(router.transition(Nav::Open(Tab::List)).is_err());
        assert!(router.transition(Nav::Back).is_err());
        assert_eq!(router.screen(), &Screen::Login);

        let mut router = logged_in();
        router.transition(Nav::Open(Tab::Profile)).unwrap();
        assert!(router.transition(Nav::OpenDetail(1)).is_err());
        assert_eq!(router.screen(), &Screen::Home(Tab::Profile));

        router.transition(Nav::Open(Tab::List)).unwrap();
        router.transition(Nav::OpenDetail(1)).unwrap();
        assert!(router.transition(Nav::Logout).is_err());
    }

    #[test]
    fn logout_clears_session() {
        let mut router = logged_in();
        router.transition(Nav::Open(Tab::Profile)).unwrap();
        router.transition(Nav::Logout).unwrap();
        assert_eq!(router.screen(), &Screen::Login);
        assert!(matches!(router.require_session(), Err(ClientError::NotLoggedIn)));
    }
}
