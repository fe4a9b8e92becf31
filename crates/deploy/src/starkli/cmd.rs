//! Command builder for starkli.

use std::path::Path;

use crate::{ClassHash, Felt, Salt};

/// Builder for starkli `declare` and `deploy` commands.
#[derive(Debug, Clone)]
pub struct StarkliCmdBuilder {
    subcommand: &'static str,
    target: String,
    rpc: Option<String>,
    account: Option<String>,
    casm_file: Option<String>,
    salt: Option<Salt>,
    watch: bool,
    ctor_args: Vec<Felt>,
    extra_args: Vec<String>,
}

impl StarkliCmdBuilder {
    fn new(subcommand: &'static str, target: String) -> Self {
        Self {
            subcommand,
            target,
            rpc: None,
            account: None,
            casm_file: None,
            salt: None,
            watch: true,
            ctor_args: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// `starkli declare <sierra>`.
    pub fn declare(sierra_path: impl AsRef<Path>) -> Self {
        Self::new("declare", sierra_path.as_ref().display().to_string())
    }

    /// `starkli deploy <class_hash> [ctor_args...]`.
    pub fn deploy(class_hash: ClassHash) -> Self {
        Self::new("deploy", class_hash.to_string())
    }

    /// Set the JSON-RPC endpoint.
    pub fn rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc = Some(url.into());
        self
    }

    /// Set the account config file.
    pub fn account(mut self, path: impl AsRef<Path>) -> Self {
        self.account = Some(path.as_ref().display().to_string());
        self
    }

    /// Set the CASM file to declare alongside the Sierra class.
    pub fn casm_file(mut self, path: impl AsRef<Path>) -> Self {
        self.casm_file = Some(path.as_ref().display().to_string());
        self
    }

    /// Set the deployment salt.
    pub fn salt(mut self, salt: Salt) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Wait for the transaction to be confirmed before returning.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Set the constructor calldata.
    pub fn ctor_args(mut self, args: impl IntoIterator<Item = Felt>) -> Self {
        self.ctor_args.extend(args);
        self
    }

    /// Add extra arguments.
    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the command as a vector of strings.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![self.subcommand.to_string()];

        if let Some(rpc) = self.rpc {
            cmd.push("--rpc".to_string());
            cmd.push(rpc);
        }

        if let Some(account) = self.account {
            cmd.push("--account".to_string());
            cmd.push(account);
        }

        if let Some(casm_file) = self.casm_file {
            cmd.push("--casm-file".to_string());
            cmd.push(casm_file);
        }

        if let Some(salt) = self.salt {
            cmd.push("--salt".to_string());
            cmd.push(salt.to_string());
        }

        if self.watch {
            cmd.push("--watch".to_string());
        }

        cmd.extend(self.extra_args);

        cmd.push(self.target);
        cmd.extend(self.ctor_args.iter().map(Felt::to_string));

        cmd
    }
}
