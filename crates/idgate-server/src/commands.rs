//! Admin subcommands that work directly against the configured storage.

use anyhow::{Result, anyhow};
use colored::Colorize;
use idgate_auth::types::{
    ClientRegistration, ClientRegistrationRequest, NewUser, join_scopes, parse_scopes,
};
use idgate_auth::{AuthStorage, Client, create_user, disable_user, register_client};

use crate::cli::{
    CreateUserArgs, DisableUserArgs, ListClientsArgs, RegisterClientArgs, ShowClientArgs,
};

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub async fn register(storage: &AuthStorage, args: &RegisterClientArgs) -> Result<ClientRegistration> {
    let mut request = ClientRegistrationRequest::new(&args.name, args.redirect_uris.clone())
        .with_scopes(parse_scopes(&args.scopes));
    if args.public {
        request = request.public();
    }

    let registration = register_client(storage.clients.as_ref(), request).await?;

    print_success(&format!("Registered client '{}'", registration.client.name));
    println!("{}: {}", "client_id".cyan(), registration.client.client_id);
    match &registration.client_secret {
        Some(secret) => {
            println!("{}: {}", "client_secret".cyan(), secret);
            println!("{}", "The secret is shown once; store it now.".yellow());
        }
        None => println!("{}: (public client)", "client_secret".cyan()),
    }
    Ok(registration)
}

pub async fn list_clients(storage: &AuthStorage, args: &ListClientsArgs) -> Result<Vec<Client>> {
    let clients = storage.clients.list(args.limit, args.offset).await?;
    if clients.is_empty() {
        println!("{}", "No clients registered".yellow());
    }
    for client in &clients {
        println!(
            "{}  {}  {}{}",
            client.client_id.cyan(),
            client.name,
            client_kind(client),
            if client.active { "" } else { "  (inactive)" }
        );
    }
    Ok(clients)
}

pub async fn show_client(storage: &AuthStorage, args: &ShowClientArgs) -> Result<Client> {
    let client = storage
        .clients
        .find_by_client_id(&args.client_id)
        .await?
        .ok_or_else(|| anyhow!("Client '{}' not found", args.client_id))?;

    println!("{}", client_details(&client));
    Ok(client)
}

fn client_kind(client: &Client) -> &'static str {
    if client.confidential {
        "confidential"
    } else {
        "public"
    }
}

fn client_details(client: &Client) -> String {
    let grant_types: Vec<&str> = client.grant_types.iter().map(|g| g.as_str()).collect();
    [
        ("client_id", client.client_id.clone()),
        ("name", client.name.clone()),
        ("type", client_kind(client).to_string()),
        ("active", client.active.to_string()),
        ("redirect_uris", client.redirect_uris.join(" ")),
        ("grant_types", grant_types.join(" ")),
        ("scopes", join_scopes(&client.scopes)),
        ("created_at", client.created_at.to_string()),
    ]
    .into_iter()
    .map(|(key, value)| format!("{}: {value}", key.cyan()))
    .collect::<Vec<_>>()
    .join("\n")
}

pub async fn create(storage: &AuthStorage, args: &CreateUserArgs) -> Result<()> {
    let user = create_user(
        storage.users.as_ref(),
        NewUser {
            username: args.username.clone(),
            email: args.email.clone(),
            password: args.password.clone(),
        },
    )
    .await?;

    print_success(&format!("Created user '{}'", user.username));
    println!("{}: {}", "id".cyan(), user.id);
    Ok(())
}

pub async fn disable(storage: &AuthStorage, args: &DisableUserArgs) -> Result<()> {
    let revoked = disable_user(
        storage.users.as_ref(),
        storage.refresh_tokens.as_ref(),
        &args.username,
    )
    .await?;

    print_success(&format!(
        "Disabled user '{}' ({revoked} refresh tokens revoked)",
        args.username
    ));
    Ok(())
}

pub async fn purge(storage: &AuthStorage) -> Result<()> {
    let report = storage.purge_expired().await?;
    print_success(&format!(
        "Purged {} expired records ({} codes, {} refresh tokens, {} sessions)",
        report.total(),
        report.codes,
        report.refresh_tokens,
        report.sessions
    ));
    Ok(())
}
