use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cipher_engine::config::APP_NAME;
use cipher_engine::file::passkey_path;
use cipher_engine::{CipherRecord, DecryptOptions, EncryptOptions, Engine, Identifiers, KeyOptions, generate_key};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

#[derive(Args)]
pub struct KeyArgs {
    /// Number of characters to generate.
    #[arg(long, default_value_t = 32)]
    key_length: usize,

    /// Preset name or literal characters to leave out of the pool.
    #[arg(long)]
    exclude_chars: Option<String>,

    /// Include punctuation in the pool.
    #[arg(long)]
    include_all_chars: bool,

    /// Allow passphrases shorter than 32 characters.
    #[arg(long)]
    bypass_keylength: bool,
}

impl KeyArgs {
    fn options(&self) -> KeyOptions {
        let options = KeyOptions::default().with_key_length(self.key_length).with_include_all_chars(self.include_all_chars).with_bypass_keylength(self.bypass_keylength);
        match &self.exclude_chars {
            Some(chars) => options.with_exclude_chars(chars.clone()),
            None => options,
        }
    }
}

#[derive(Args)]
pub struct EncryptArgs {
    /// Passphrase (generated when omitted).
    #[arg(short, long)]
    passphrase: Option<String>,

    #[command(flatten)]
    key: KeyArgs,

    /// Number of salts, and therefore derived keys.
    #[arg(long, default_value_t = 2)]
    salts: usize,

    /// Byte size of each salt.
    #[arg(long)]
    salt_size: Option<usize>,

    /// PBKDF2 iterations (scaled to the available cores when omitted).
    #[arg(long)]
    iterations: Option<u32>,

    /// Custom start and end identifiers.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    identifiers: Option<Vec<String>>,

    /// Directory receiving the passkey file.
    #[arg(long)]
    export_path: Option<PathBuf>,

    /// Stem of the passkey file.
    #[arg(long)]
    passkey_name: Option<String>,

    /// Do not write a passkey file.
    #[arg(long)]
    no_export: bool,

    /// Seal the ciphertext again with an X25519 key pair.
    #[arg(long)]
    advanced: bool,
}

impl EncryptArgs {
    fn options(&self) -> Result<EncryptOptions> {
        let mut options = EncryptOptions::default()
            .with_key(self.key.options())
            .with_num_of_salts(self.salts)
            .with_export_passkey(!self.no_export)
            .with_advanced_encryption(self.advanced);

        if let Some(passphrase) = &self.passphrase {
            options = options.with_passphrase(passphrase.clone());
        }
        if let Some(size) = self.salt_size {
            options = options.with_salt_bytes_size(size);
        }
        if let Some(iterations) = self.iterations {
            options = options.with_iterations(iterations);
        }
        if let Some([start, end]) = self.identifiers.as_deref() {
            options = options.with_identifiers(Identifiers::new(start.clone(), end.clone())?);
        }
        if let Some(path) = &self.export_path {
            options = options.with_export_path(path.clone());
        }
        if let Some(name) = &self.passkey_name {
            options = options.with_passkey_file_name(name.clone());
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a passphrase.
    GenerateKey {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Encrypt a file.
    EncryptFile {
        /// Input file path.
        #[arg(short, long)]
        input: PathBuf,

        /// Replace the original file.
        #[arg(long)]
        overwrite: bool,

        /// Skip the timestamped backup of the original.
        #[arg(long)]
        no_backup: bool,

        #[command(flatten)]
        encrypt: EncryptArgs,
    },

    /// Decrypt a file described by a passkey file.
    DecryptFile {
        /// Passkey file written at encryption time.
        #[arg(short = 'k', long)]
        passkey_file: PathBuf,

        /// Passphrase overriding the one stored in the passkey file.
        #[arg(short, long)]
        passphrase: Option<String>,

        /// Restore the original path and remove the encrypted file.
        #[arg(long)]
        overwrite: bool,
    },

    /// Encrypt a piece of text.
    EncryptText {
        /// Text to encrypt.
        #[arg(short, long)]
        text: String,

        #[command(flatten)]
        encrypt: EncryptArgs,
    },

    /// Decrypt the text described by a passkey file.
    DecryptText {
        /// Passkey file written at encryption time.
        #[arg(short = 'k', long)]
        passkey_file: PathBuf,

        /// Passphrase overriding the one stored in the passkey file.
        #[arg(short, long)]
        passphrase: Option<String>,
    },
}

#[derive(Parser)]
#[command(name = "cipher-engine", version, about = "Multi-key encryption for text and files with tiered decryption and integrity checks.")]
pub struct App {
    /// Log debug output, including stage transitions.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl App {
    pub fn init() -> Result<Self> {
        let app = Self::parse();
        let level = if app.verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = tracing_subscriber::fmt().with_max_level(level).with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(app)
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::GenerateKey { key } => Self::generate(&key),
            Commands::EncryptFile { input, overwrite, no_backup, encrypt } => {
                let options = encrypt.options()?.with_overwrite_file(overwrite).with_backup_file(!no_backup);
                Self::encrypt_file(&input, &options)
            }
            Commands::DecryptFile { passkey_file, passphrase, overwrite } => {
                let options = Self::decrypt_options(passkey_file, passphrase).with_overwrite_file(overwrite);
                Self::decrypt_file(&options)
            }
            Commands::EncryptText { text, encrypt } => Self::encrypt_text(&text, &encrypt.options()?),
            Commands::DecryptText { passkey_file, passphrase } => Self::decrypt_text(&Self::decrypt_options(passkey_file, passphrase)),
        }
    }

    fn generate(key: &KeyArgs) -> Result<()> {
        let generated = generate_key(&key.options()).context("key generation failed")?;
        if let Some(advisory) = generated.advisory {
            eprintln!("! token budget {} is too small; {} was used instead", advisory.configured, advisory.recommended);
        }
        println!("{}", generated.key.expose_secret());
        Ok(())
    }

    fn encrypt_file(input: &Path, options: &EncryptOptions) -> Result<()> {
        let record = Self::engine()?.encrypt_file(input, options).with_context(|| format!("encryption failed: {}", input.display()))?;
        let Some(output) = record.encrypted_file() else { bail!("{APP_NAME} returned a text record for a file") };

        println!("✓ Encrypted: {} -> {}", input.display(), output.display());
        Self::show_passkey(&record, Some(output), options);
        Ok(())
    }

    fn decrypt_file(options: &DecryptOptions) -> Result<()> {
        let decrypted = Self::engine()?.decrypt_file(options).context("decryption failed")?;
        println!("✓ Decrypted: {} (sha256 {})", decrypted.path.display(), decrypted.hash_value);
        Ok(())
    }

    fn encrypt_text(text: &str, options: &EncryptOptions) -> Result<()> {
        let record = Self::engine()?.encrypt_text(text, options).context("encryption failed")?;
        let Some(encrypted) = record.encrypted_text() else { bail!("{APP_NAME} returned a file record for text") };

        println!("{encrypted}");
        Self::show_passkey(&record, None, options);
        Ok(())
    }

    fn decrypt_text(options: &DecryptOptions) -> Result<()> {
        let decrypted = Self::engine()?.decrypt_text(options).context("decryption failed")?;
        println!("{}", decrypted.text);
        Ok(())
    }

    fn decrypt_options(passkey_file: PathBuf, passphrase: Option<String>) -> DecryptOptions {
        let options = DecryptOptions::default().with_passkey_file(passkey_file);
        match passphrase {
            Some(passphrase) => options.with_passphrase(passphrase),
            None => options,
        }
    }

    fn show_passkey(record: &CipherRecord, source: Option<&Path>, options: &EncryptOptions) {
        if !options.export_passkey {
            println!("{}", record.security.passkey);
            return;
        }
        if let Ok(path) = passkey_path(source, options.export_path.as_deref(), options.passkey_file_name.as_deref()) {
            println!("✓ Passkey: {}", path.display());
        }
    }

    fn engine() -> Result<Engine> {
        Engine::with_defaults().context("failed to start the engine")
    }
}
