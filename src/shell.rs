use crate::auth::AuthService;
use crate::browse::BrowseView;
use crate::error::{ClientError, ClientResult};
use crate::listings::{results_summary, FilterCriteria, ListingDraft, ListingManager, ListingRepository};
use crate::models::{Listing, ListingType};
use crate::session::{Nav, Router, Screen, Session, Tab};
use crate::store::DocumentStore;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, name = "logement")]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    /// Create an account
    Signup {
        username: String,
        email: String,
        phone: String,
        password: String,
    },
    /// Log in with email and password
    Login { email: String, password: String },
    Logout,
    /// Show the listings matching the current search and filters
    List,
    /// Set the free-text search (no text clears it)
    Search { text: Vec<String> },
    /// Set the structured filters
    Filter {
        #[arg(long)]
        ville: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        min: Option<String>,
        #[arg(long)]
        max: Option<String>,
        /// Required amenity, repeatable
        #[arg(long = "equip")]
        amenities: Vec<String>,
        /// Only available listings
        #[arg(long)]
        dispo: bool,
    },
    /// Clear search text and filters
    Reset,
    /// Listing detail
    Show { id: i64 },
    Back,
    /// Star or unstar a listing
    Fav { id: i64 },
    /// Remove a listing from favorites
    Unfav { id: i64 },
    /// Favorites, optionally narrowed by text
    Favorites { text: Vec<String> },
    Profile,
    /// Listings you own
    Myads,
    /// Publish a new listing
    Create(ListingArgs),
    /// Edit one of your listings
    Edit {
        id: i64,
        #[command(flatten)]
        fields: ListingArgs,
    },
    /// Delete one of your listings
    Delete { id: i64 },
    Quit,
}

#[derive(Args, Debug, Default)]
struct ListingArgs {
    #[arg(long)]
    titre: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    ville: Option<String>,
    #[arg(long)]
    quartier: Option<String>,
    #[arg(long)]
    prix: Option<String>,
    #[arg(long)]
    surface: Option<String>,
    #[arg(long)]
    indisponible: bool,
    /// Amenity to switch on or off, repeatable
    #[arg(long = "equip")]
    amenities: Vec<String>,
    #[arg(long = "photo")]
    photos: Vec<String>,
}

impl ListingArgs {
    fn apply(self, draft: &mut ListingDraft) -> ClientResult<()> {
        if let Some(kind) = self.kind {
            draft.kind = ListingType::parse(&kind)
                .ok_or_else(|| ClientError::validation("type", format!("Type inconnu : {kind}")))?
                .as_str()
                .to_string();
        }
        let fields = [
            (self.titre, &mut draft.title),
            (self.description, &mut draft.description),
            (self.ville, &mut draft.city),
            (self.quartier, &mut draft.neighbourhood),
            (self.prix, &mut draft.price),
            (self.surface, &mut draft.surface),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if self.indisponible {
            draft.available = false;
        }
        for amenity in &self.amenities {
            draft.toggle_amenity(amenity);
        }
        if !self.photos.is_empty() {
            draft.photos = self.photos;
        }
        Ok(())
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Interactive client: one command per line, every failure shown as an alert.
pub struct Shell {
    store: Arc<dyn DocumentStore>,
    auth: AuthService,
    manager: ListingManager,
    router: Router,
    view: Option<BrowseView>,
}

impl Shell {
    pub fn new(store: Arc<dyn DocumentStore>, write_attempts: u32, placeholder_photo: &str) -> Self {
        let repo = ListingRepository::new(store.clone(), write_attempts);
        Self {
            auth: AuthService::new(store.clone()),
            manager: ListingManager::new(repo, placeholder_photo),
            store,
            router: Router::new(),
            view: None,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("Connected to {} store", self.store.backend_name());
        println!("Tapez `help` pour la liste des commandes.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{}> ", self.router.screen().title());
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(words) = shlex::split(&line) else {
                println!("⚠️  Guillemets non fermés");
                continue;
            };
            if words.is_empty() {
                continue;
            }

            let parsed = match ShellLine::try_parse_from(words) {
                Ok(parsed) => parsed,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            match self.execute(parsed.command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => println!("⚠️  {err}"),
            }
        }
        Ok(())
    }

    fn session(&self) -> ClientResult<Session> {
        self.router.require_session().cloned()
    }

    fn view(&mut self) -> ClientResult<&mut BrowseView> {
        self.view.as_mut().ok_or(ClientError::NotLoggedIn)
    }

    /// Switch tab unless already there.
    fn open(&mut self, tab: Tab) -> ClientResult<()> {
        if *self.router.screen() != Screen::Home(tab) {
            self.router.transition(Nav::Open(tab))?;
        }
        Ok(())
    }

    fn listing(&mut self, id: i64) -> ClientResult<Listing> {
        self.view()?
            .listing(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Logement {id} introuvable")))
    }

    /// The session user's listing `id`; other owners reuse the same ids.
    fn own_listing(&mut self, email: &str, id: i64) -> ClientResult<Listing> {
        self.view()?
            .owned_listing(email, id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Vous n'avez pas d'annonce {id}")))
    }

    async fn execute(&mut self, command: ShellCommand) -> ClientResult<Flow> {
        debug!("Command on {:?}", self.router.screen());
        match command {
            ShellCommand::Signup { username, email, phone, password } => {
                match self.router.screen() {
                    Screen::Login => {
                        self.router.transition(Nav::ShowSignUp)?;
                    }
                    Screen::SignUp => {}
                    _ => return Err(ClientError::InvalidNavigation),
                }
                self.auth.sign_up(&username, &email, &phone, &password).await?;
                println!("Inscription réussie !");
                self.router.transition(Nav::ShowLogin)?;
            }
            ShellCommand::Login { email, password } => {
                if *self.router.screen() == Screen::SignUp {
                    self.router.transition(Nav::ShowLogin)?;
                }
                if *self.router.screen() != Screen::Login {
                    return Err(ClientError::InvalidNavigation);
                }
                let session = self.auth.log_in(&email, &password).await?;
                let view = BrowseView::load(self.manager.repository(), self.store.clone(), &session).await;
                println!("Bienvenue {} !", session.username);
                self.router.transition(Nav::LoggedIn(session))?;
                self.view = Some(view);
                self.print_visible()?;
            }
            ShellCommand::Logout => {
                self.router.transition(Nav::Logout)?;
                self.view = None;
                println!("Déconnecté.");
            }
            ShellCommand::List => {
                self.open(Tab::List)?;
                self.print_visible()?;
            }
            ShellCommand::Search { text } => {
                self.open(Tab::List)?;
                self.view()?.set_query(&text.join(" "));
                self.print_visible()?;
            }
            ShellCommand::Filter { ville, kind, min, max, amenities, dispo } => {
                self.open(Tab::List)?;
                let mut criteria = FilterCriteria {
                    city: ville.unwrap_or_default(),
                    kind: kind.unwrap_or_default(),
                    min_price: min.unwrap_or_default(),
                    max_price: max.unwrap_or_default(),
                    available_only: dispo,
                    ..Default::default()
                };
                for amenity in &amenities {
                    criteria.toggle_amenity(amenity);
                }
                self.view()?.set_filter_criteria(criteria);
                self.print_visible()?;
            }
            ShellCommand::Reset => {
                self.open(Tab::List)?;
                let view = self.view()?;
                if view.query().is_empty() && view.criteria().is_empty() {
                    println!("Aucun filtre actif");
                }
                view.reset_filters();
                self.print_visible()?;
            }
            ShellCommand::Show { id } => {
                let listing = self.listing(id)?;
                self.router.transition(Nav::OpenDetail(id))?;
                self.print_detail(&listing)?;
            }
            ShellCommand::Back => {
                self.router.transition(Nav::Back)?;
            }
            ShellCommand::Fav { id } => {
                self.session()?;
                let listing = self.listing(id)?;
                let starred = self.view()?.toggle_favorite(&listing).await?;
                println!("{}", if starred { "♥ Ajouté aux favoris" } else { "♡ Retiré des favoris" });
            }
            ShellCommand::Unfav { id } => {
                self.session()?;
                self.view()?.remove_favorite(id).await?;
                println!("♡ Retiré des favoris");
            }
            ShellCommand::Favorites { text } => {
                self.open(Tab::Favorites)?;
                let favorites = self.view()?.favorites_view(&text.join(" "));
                if favorites.is_empty() {
                    println!("Aucun favori");
                }
                for (index, favorite) in favorites.iter().enumerate() {
                    let marker = if favorite.stale { " (annonce retirée)" } else { "" };
                    println!("{}. {}{}", index + 1, favorite.listing.card(), marker);
                }
            }
            ShellCommand::Profile => {
                self.open(Tab::Profile)?;
                let session = self.session()?;
                let auth = self.auth.clone();
                let summary = self.view()?.profile_summary(&auth, &session).await?;
                println!("{} <{}> ☎ {}", summary.user.username, summary.user.email, summary.user.phone);
                println!("Favoris : {}  ·  Annonces : {}", summary.favorites, summary.listings);
            }
            ShellCommand::Myads => {
                self.open(Tab::MyAds)?;
                self.print_my_ads()?;
            }
            ShellCommand::Create(fields) => {
                self.open(Tab::MyAds)?;
                let session = self.session()?;
                let mut draft = ListingDraft::default();
                fields.apply(&mut draft)?;
                let listing = self.manager.create(&session.email, &draft).await?;
                println!("Votre logement a été ajouté avec succès ! (#{})", listing.id);
                self.refresh_listings().await?;
            }
            ShellCommand::Edit { id, fields } => {
                self.open(Tab::MyAds)?;
                let session = self.session()?;
                let current = self.own_listing(&session.email, id)?;
                let mut draft = ListingDraft::from_listing(&current);
                fields.apply(&mut draft)?;
                self.manager.update(&session.email, &current, &draft).await?;
                println!("Votre logement a été modifié avec succès !");
                self.refresh_listings().await?;
            }
            ShellCommand::Delete { id } => {
                self.open(Tab::MyAds)?;
                let session = self.session()?;
                let current = self.own_listing(&session.email, id)?;
                self.manager.delete(&session.email, &current).await?;
                self.view()?.forget_listing(&session.email, id);
                println!("L'annonce a été supprimée avec succès !");
            }
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn refresh_listings(&mut self) -> ClientResult<()> {
        let repo = self.manager.repository().clone();
        self.view()?.reload_listings(&repo).await?;
        self.print_my_ads()
    }

    fn print_visible(&mut self) -> ClientResult<()> {
        let view = self.view()?;
        println!("{}", results_summary(view.visible_listings().len()));
        if view.visible_listings().is_empty() {
            if view.all_listings().is_empty() {
                println!("Aucun logement disponible");
            } else {
                println!("Aucun résultat, essayez de modifier vos critères de recherche");
            }
        }
        for listing in view.visible_listings() {
            let heart = if view.is_favorite(listing.id) { "♥" } else { "♡" };
            println!("{} {}", heart, listing.card());
        }
        Ok(())
    }

    fn print_my_ads(&mut self) -> ClientResult<()> {
        let email = self.session()?.email;
        let mine = self.view()?.my_listings(&email);
        if mine.is_empty() {
            println!("Vous n'avez encore publié aucune annonce");
        }
        for listing in &mine {
            println!("{}", listing.card());
        }
        Ok(())
    }

    fn print_detail(&mut self, listing: &Listing) -> ClientResult<()> {
        let favorite = self.view()?.is_favorite(listing.id);
        println!("{}", listing.card());
        if !listing.description.is_empty() {
            println!("\n{}", listing.description);
        }
        if let Some(photo) = listing.cover_photo() {
            println!("Photo : {}", photo);
        }
        if let Some(link) = listing.contact_link() {
            println!("Contact : {}", link);
        }
        println!("{}", if favorite { "♥ Dans vos favoris" } else { "♡ Pas dans vos favoris" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> ShellCommand {
        ShellLine::try_parse_from(shlex::split(line).unwrap()).unwrap().command
    }

    fn shell() -> (Arc<MemoryStore>, Shell) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Shell::new(store, 3, "https://img/placeholder.jpg"))
    }

    #[test]
    fn parses_quoted_listing_fields() {
        match parse(r#"create --titre "Bel F3 lumineux" --ville Oran --equip WiFi --equip Parking"#) {
            ShellCommand::Create(args) => {
                assert_eq!(args.titre.as_deref(), Some("Bel F3 lumineux"));
                assert_eq!(args.amenities, vec!["WiFi".to_string(), "Parking".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn listing_args_fill_the_draft() {
        let mut draft = ListingDraft::default();
        let args = ListingArgs {
            titre: Some("T".into()),
            kind: Some("Colocation".into()),
            prix: Some("9000".into()),
            indisponible: true,
            amenities: vec!["WiFi".into()],
            ..Default::default()
        };
        args.apply(&mut draft).unwrap();
        assert_eq!(draft.title, "T");
        assert_eq!(draft.kind, "colocation");
        assert_eq!(draft.price, "9000");
        assert!(!draft.available);
        assert_eq!(draft.amenities, vec!["WiFi".to_string()]);

        let bad = ListingArgs { kind: Some("villa".into()), ..Default::default() };
        assert!(matches!(bad.apply(&mut draft), Err(ClientError::Validation { field: "type", .. })));
    }

    #[tokio::test]
    async fn full_session_flow() {
        let (store, mut shell) = shell();

        shell
            .execute(parse("signup amine a.k@mail.dz 0555 pw"))
            .await
            .unwrap();
        assert_eq!(shell.router.screen(), &Screen::Login);

        assert!(matches!(
            shell.execute(parse("login a.k@mail.dz wrong")).await,
            Err(ClientError::Auth(_))
        ));
        shell.execute(parse("login a.k@mail.dz pw")).await.unwrap();
        assert_eq!(shell.router.screen(), &Screen::Home(Tab::List));

        shell
            .execute(parse("create --titre Studio --ville Alger --quartier Hydra --prix 15000"))
            .await
            .unwrap();
        assert_eq!(shell.router.screen(), &Screen::Home(Tab::MyAds));
        assert!(store.get("logements/0").await.unwrap().is_some());

        shell.execute(parse("fav 51")).await.unwrap();
        assert!(shell.view.as_ref().unwrap().is_favorite(51));

        shell.execute(parse("edit 51 --prix 18000")).await.unwrap();
        assert_eq!(store.get("logements/0/prix").await.unwrap(), Some(serde_json::json!(18000)));

        shell.execute(parse("show 51")).await.unwrap();
        shell.execute(parse("back")).await.unwrap();
        assert_eq!(shell.router.screen(), &Screen::Home(Tab::MyAds));

        shell.execute(parse("delete 51")).await.unwrap();
        assert_eq!(store.get("logements").await.unwrap(), None);
        assert!(shell.view.as_ref().unwrap().listing(51).is_some(), "favorite copy remains");

        shell.execute(parse("profile")).await.unwrap();
        shell.execute(parse("logout")).await.unwrap();
        assert!(shell.view.is_none());
        assert!(matches!(
            shell.execute(parse("list")).await,
            Err(ClientError::InvalidNavigation)
        ));
    }

    #[tokio::test]
    async fn edit_and_delete_resolve_ids_among_own_listings() {
        let store = Arc::new(MemoryStore::with_root(serde_json::json!({
            "logements": {
                "0": {"id": 51, "titre": "A flat", "ville": "Alger", "quartier": "Hydra",
                      "prix": 100, "proprietaire": "a@x.dz"}
            }
        })));
        let mut shell = Shell::new(store.clone(), 3, "https://img/placeholder.jpg");
        shell.execute(parse("signup bea b@x.dz 0666 pw")).await.unwrap();
        shell.execute(parse("login b@x.dz pw")).await.unwrap();
        shell
            .execute(parse("create --titre \"B flat\" --ville Oran --quartier Centre --prix 200"))
            .await
            .unwrap();

        shell.execute(parse("edit 51 --prix 250")).await.unwrap();
        assert_eq!(store.get("logements/0/prix").await.unwrap(), Some(serde_json::json!(100)));
        assert_eq!(store.get("logements/1/prix").await.unwrap(), Some(serde_json::json!(250)));

        shell.execute(parse("delete 51")).await.unwrap();
        assert_eq!(store.get("logements/0/titre").await.unwrap(), Some(serde_json::json!("A flat")));
        assert_eq!(store.get("logements/1").await.unwrap(), None);
        assert!(matches!(
            shell.execute(parse("delete 51")).await,
            Err(ClientError::NotFound(_))
        ));
    }
}
