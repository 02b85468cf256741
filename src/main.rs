use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use movie_store::config::{Backend, ClientConfig};
use movie_store::context::AppContext;
use movie_store::logging;
use movie_store::model::{Comment, Movie, NewComment, ProfileUpdate, UserRegistration};

#[derive(Parser)]
#[command(name = "movie-store", about = "Browse, rate and discuss movies from the terminal")]
struct Cli {
    /// Use the built-in demo backend instead of the HTTP service
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all movies
    Movies,
    /// List popular movies
    Popular,
    /// List movie categories
    Categories,
    /// List personal recommendations
    Recommendations,
    /// Load popular movies, categories and recommendations together
    Home,
    /// Show one movie
    Movie { id: String },
    /// List the movies of a category
    Category { id: String },
    /// Show the comments on a movie
    Comments { movie_id: String },
    /// Comment on a movie as the logged-in user
    Comment { movie_id: String, content: String },
    /// Rate a movie from 0 to 5
    Rate { movie_id: String, rating: f32 },
    /// Show your rating history
    History,
    /// Search cached movies by title, original title or description
    Search { query: String },
    Login { email: String, password: String },
    Register {
        username: String,
        email: String,
        password: String,
        #[arg(long, default_value = "")]
        gender: String,
        #[arg(long, default_value_t = 0)]
        age: u32,
        #[arg(long, default_value = "")]
        profession: String,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    UpdateProfile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        profession: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if cli.mock {
        config.backend = Backend::Mock;
    }

    tracing::info!("=== movie-store starting ===");

    let mut ctx = AppContext::from_config(&config)?;
    ctx.wait_for_session().await;

    let result = run(&ctx, cli.command).await;
    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    let content = &ctx.content;
    let session = &ctx.session;

    match command {
        Command::Movies => {
            ensure(content.fetch_movies().await, content.error())?;
            print_movies(&content.all_movies());
        }
        Command::Popular => {
            ensure(content.fetch_popular_movies().await, content.error())?;
            print_movies(&content.popular_movies());
        }
        Command::Categories => {
            ensure(content.fetch_categories().await, content.error())?;
            for category in content.categories() {
                println!("{:>4}  {}", category.id, category.name);
            }
        }
        Command::Recommendations => {
            ensure(content.fetch_recommendations().await, content.error())?;
            print_movies(&content.recommendations());
        }
        Command::Home => {
            let (popular, categories, recommendations) = futures::join!(
                content.fetch_popular_movies(),
                content.fetch_categories(),
                content.fetch_recommendations(),
            );
            ensure(popular && categories && recommendations, content.error())?;

            println!("Popular");
            print_movies(&content.popular_movies());
            println!("\nCategories");
            let names: Vec<String> = content.categories().into_iter().map(|c| c.name).collect();
            println!("  {}", names.join(" / "));
            println!("\nRecommended for you");
            print_movies(&content.recommendations());
        }
        Command::Movie { id } => match content.get_movie(&id).await {
            Some(movie) => print_movie_detail(&movie),
            None => match content.error() {
                Some(message) => bail!(message),
                None => println!("No movie with id {}", id),
            },
        },
        Command::Category { id } => {
            let movies = content.fetch_movies_by_category(&id).await;
            if let Some(message) = content.error() {
                bail!(message);
            }
            print_movies(&movies);
        }
        Command::Comments { movie_id } => {
            let comments = content.fetch_comments(&movie_id).await;
            if let Some(message) = content.error() {
                bail!(message);
            }
            print_comments(&comments);
        }
        Command::Comment { movie_id, content: text } => {
            let Some(user) = session.user() else {
                bail!("Log in before commenting");
            };
            let comment = NewComment {
                movie_id,
                user_id: user.id,
                username: user.username,
                content: text,
            };
            match content.add_comment(comment).await {
                Some(created) => print_comments(std::slice::from_ref(&created)),
                None => bail!(content.error().unwrap_or_default()),
            }
        }
        Command::Rate { movie_id, rating } => {
            if !(0.0..=5.0).contains(&rating) {
                bail!("Rating must be between 0 and 5");
            }
            ensure(content.rate_movie(&movie_id, rating).await, content.error())?;
            println!("Rated movie {} with {:.1}", movie_id, rating);
        }
        Command::History => {
            ensure(content.fetch_rating_history().await, content.error())?;
            for record in content.rating_history() {
                println!("{}  movie {:>4}  {:.1}", record.date.format("%Y-%m-%d %H:%M"), record.movie_id, record.rating);
            }
        }
        Command::Search { query } => {
            let results = content.search_movies(&query).await;
            if results.is_empty() {
                if let Some(message) = content.error() {
                    bail!(message);
                }
                println!("No movies match '{}'", query);
            }
            print_movies(&results);
        }
        Command::Login { email, password } => {
            ensure(session.login(&email, &password).await, session.login_error())?;
            print_user(session);
        }
        Command::Register { username, email, password, gender, age, profession } => {
            let registration = UserRegistration {
                username,
                email,
                password,
                gender,
                age,
                profession,
            };
            ensure(session.register(&registration).await, session.registration_error())?;
            print_user(session);
        }
        Command::Logout => {
            session.logout();
            println!("Logged out");
        }
        Command::Whoami => print_user(session),
        Command::UpdateProfile { username, email, gender, age, profession, avatar } => {
            let update = ProfileUpdate {
                username,
                email,
                gender,
                age,
                profession,
                avatar,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            ensure(session.update_profile(&update).await, Some("Profile update failed".to_string()))?;
            print_user(session);
        }
    }

    Ok(())
}

fn ensure(ok: bool, message: Option<String>) -> Result<()> {
    if ok {
        return Ok(());
    }
    bail!(message.unwrap_or_else(|| "Request failed".to_string()))
}

fn print_movies(movies: &[Movie]) {
    for movie in movies {
        let original = movie
            .original_title
            .as_deref()
            .map(|t| format!(" ({})", t))
            .unwrap_or_default();
        println!("{:>4}  {}{}  {}  ★{:.1}", movie.id, movie.title, original, movie.year, movie.rating);
    }
}

fn print_movie_detail(movie: &Movie) {
    print_movies(std::slice::from_ref(movie));
    println!("      {}", movie.description);
    println!("      categories: {}", movie.categories.join(", "));
}

fn print_comments(comments: &[Comment]) {
    for comment in comments {
        println!("[{}] {}: {}", comment.date.format("%Y-%m-%d"), comment.username, comment.content);
    }
}

fn print_user(session: &movie_store::model::SessionStore) {
    match session.user() {
        Some(user) => {
            println!("{} <{}>", user.username, user.email);
            if let Some(profession) = user.profession {
                println!("  profession: {}", profession);
            }
            if let Some(age) = user.age {
                println!("  age: {}", age);
            }
        }
        None => println!("Not logged in"),
    }
}
