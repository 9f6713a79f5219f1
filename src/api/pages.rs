use axum::extract::State;
use axum::response::{IntoResponse, Redirect};
use axum_extra::extract::Form;
use axum_template::RenderHtml;
use serde::Deserialize;

use super::{App, Result, ViewKey, VisitorAddress};

/// GET / and GET /cached_index
pub async fn index(State(app): State<App>) -> Result<impl IntoResponse> {
    render(&app, ViewKey::LandingAggregate).await
}

/// GET /map
pub async fn map(State(app): State<App>) -> Result<impl IntoResponse> {
    render(&app, ViewKey::MapSnapshot).await
}

async fn render(app: &App, key: ViewKey) -> Result<impl IntoResponse> {
    let view = app.view(key).await?;
    Ok(RenderHtml(key.template(), app.templates.clone(), view))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClickForm {
    /// Checkbox value, `on` when ticked.
    #[serde(default)]
    pub anonymous: Option<String>,
}

impl ClickForm {
    pub fn is_anonymous(&self) -> bool {
        self.anonymous.as_deref() == Some("on")
    }
}

/// POST /
pub async fn click(
    State(app): State<App>,
    VisitorAddress(address): VisitorAddress,
    Form(form): Form<ClickForm>,
) -> Result<Redirect> {
    app.record_click(address.as_deref(), form.is_anonymous())
        .await?;

    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_checked_box_is_anonymous() {
        let checked = ClickForm {
            anonymous: Some("on".into()),
        };
        assert!(checked.is_anonymous());

        assert!(!ClickForm::default().is_anonymous());
        assert!(!ClickForm {
            anonymous: Some("off".into())
        }
        .is_anonymous());
    }
}
