#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::transport::smtp::client::{Tls, TlsParameters};
#[cfg(feature = "web")]
use lettre::{Message, SmtpTransport, Transport};
#[cfg(feature = "web")]
use rand::Rng;
#[cfg(feature = "web")]
use std::error::Error;

#[cfg(feature = "web")]
pub struct Mailer {
    smtp: SmtpTransport,
    from: String,
}

#[cfg(feature = "web")]
impl Mailer {
    /// Builds the SMTP transport from the `SMTP_HOST`, `SMTP_PORT`,
    /// `SMTP_USER`, `SMTP_PASS` and `SMTP_FROM` environment variables.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let host = std::env::var("SMTP_HOST")?;
        let port: u16 = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "465".to_string())
            .parse()?;
        let user = std::env::var("SMTP_USER")?;
        let pass = std::env::var("SMTP_PASS")?;
        let from = std::env::var("SMTP_FROM").unwrap_or_else(|_| user.clone());

        let creds = Credentials::new(user, pass);
        let tls_parameters = TlsParameters::new(host.clone())?;

        let smtp = SmtpTransport::relay(&host)?
            .credentials(creds)
            .port(port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(Mailer { smtp, from })
    }

    pub fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), Box<dyn Error>> {
        let base_url = std::env::var("STEMDASH_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let reset_link = format!(
            "{}/reset?email={}&code={}",
            base_url,
            urlencoding::encode(to_email),
            urlencoding::encode(reset_code)
        );

        let email = Message::builder()
            .from(format!("STEM Data Dashboard <{}>", self.from).parse()?)
            .to(to_email.parse()?)
            .subject("Password Reset Request")
            .body(format!(
                "Your password reset code is: {}\nReset your password at {}\nThis code will expire in 1 hour.",
                reset_code, reset_link
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }

    pub fn send_otp(&self, to_email: &str, otp: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(format!("STEM Data Dashboard <{}>", self.from).parse()?)
            .to(to_email.parse()?)
            .subject("Your One Time Passcode")
            .body(format!(
                "Your one time passcode is: {}\nIt expires in 2 minutes.",
                otp
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }
}

#[cfg(feature = "web")]
pub fn generate_reset_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(feature = "web")]
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}
