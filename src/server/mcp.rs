use crate::app::dto::*;
use crate::app::engine::AnalysisEngine;
use crate::domain::pipeline::AnalysisReport;
use rmcp::{
    Json, ServerHandler, ServiceExt, handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters, model::*, tool, tool_handler, tool_router,
    transport::stdio,
};
use tokio::task::spawn_blocking;

#[derive(Clone)]
pub struct TestgenMcpServer {
    engine: AnalysisEngine,
    tool_router: ToolRouter<Self>,
}

impl TestgenMcpServer {
    pub fn new(engine: AnalysisEngine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

#[tool_router]
impl TestgenMcpServer {
    #[tool(
        description = "Analyze an inline unit model document and return the full report (graph, workflows, error contracts, scenarios, diagnostics)."
    )]
    async fn analyze_model(
        &self,
        params: Parameters<AnalyzeRequest>,
    ) -> Result<Json<AnalysisReport>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.analyze(req))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| format!("{e:#}"))
    }

    #[tool(description = "List synthesized test scenarios, optionally filtered by tag or unit.")]
    async fn list_scenarios(
        &self,
        params: Parameters<ScenarioQuery>,
    ) -> Result<Json<ScenariosResponse>, String> {
        let engine = self.engine.clone();
        let q = params.0;
        spawn_blocking(move || engine.scenarios(q))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "List retained end-to-end workflows, optionally for one entry unit.")]
    async fn list_workflows(
        &self,
        params: Parameters<WorkflowQuery>,
    ) -> Result<Json<WorkflowsResponse>, String> {
        let engine = self.engine.clone();
        let q = params.0;
        spawn_blocking(move || engine.workflows(q))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Get the error contract (error kinds that can surface) of one unit or all units.")]
    async fn error_contract(
        &self,
        params: Parameters<ContractQuery>,
    ) -> Result<Json<ContractsResponse>, String> {
        let engine = self.engine.clone();
        let q = params.0;
        spawn_blocking(move || engine.contracts(q))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for TestgenMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Inspect component interactions and synthesized integration-test scenarios for an analyzed codebase."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
