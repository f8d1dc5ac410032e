//! Passive check for response headers that disclose server software

use super::{Issue, Module, ModuleContext, ModuleError, ModuleInfo, Severity};
use crate::audit::Page;
use async_trait::async_trait;

const NAME: &str = "headers";

/// Flags headers revealing server or framework versions
pub struct HeaderDisclosure;

impl HeaderDisclosure {
    fn findings(page: &Page) -> Vec<Issue> {
        let mut issues = Vec::new();

        if let Some(server) = page.header("server") {
            if server.chars().any(|c| c.is_ascii_digit()) {
                issues.push(
                    Issue::new(
                        "Server version disclosure",
                        NAME,
                        page.url(),
                        Severity::Low,
                        "The Server header reveals the exact server software version.",
                    )
                    .with_remark(format!("Server: {}", server)),
                );
            }
        }

        if let Some(powered) = page.header("x-powered-by") {
            issues.push(
                Issue::new(
                    "Framework disclosure",
                    NAME,
                    page.url(),
                    Severity::Informational,
                    "The X-Powered-By header reveals the application framework.",
                )
                .with_remark(format!("X-Powered-By: {}", powered)),
            );
        }

        if let Some(version) = page.header("x-aspnet-version") {
            issues.push(
                Issue::new(
                    "ASP.NET version disclosure",
                    NAME,
                    page.url(),
                    Severity::Low,
                    "The X-AspNet-Version header reveals the runtime version.",
                )
                .with_remark(format!("X-AspNet-Version: {}", version)),
            );
        }

        issues
    }
}

#[async_trait]
impl Module for HeaderDisclosure {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: NAME.to_string(),
            description: "Flags response headers that disclose software versions".to_string(),
            priority: 100,
        }
    }

    async fn run(&self, page: &Page, ctx: &ModuleContext) -> Result<(), ModuleError> {
        if page.is_no_response() {
            return Ok(());
        }
        for issue in Self::findings(page) {
            ctx.register_issue(issue);
        }
        Ok(())
    }
}
