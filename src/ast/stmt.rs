//! Statement nodes.

use super::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskType {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Increase,
    Decrease,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub start: Expr,
    pub end: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ServerHandler {
    pub method: String,
    pub path: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Bare expression used as a statement (a function call for its effects).
    Expr(Expr),

    Say(Vec<Expr>),
    Print(Expr),
    ClearScreen,
    ShowTable {
        headers: Expr,
        rows: Expr,
    },
    Ask {
        prompt: Option<Expr>,
        var_name: String,
        ask_type: AskType,
    },

    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    RepeatForever(Vec<Stmt>),
    RepeatTimes {
        count: Expr,
        body: Vec<Stmt>,
    },
    RepeatUntil {
        condition: Expr,
        body: Vec<Stmt>,
    },
    DoUntil {
        body: Vec<Stmt>,
        condition: Expr,
    },
    Break,
    Continue,
    Stop,

    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),

    Match {
        expr: Expr,
        cases: Vec<MatchCase>,
    },

    Assignment {
        target: Expr,
        value: Expr,
    },
    Mutation {
        target: Expr,
        op: MutationOp,
        value: Option<Expr>,
    },

    ListAdd {
        list: Expr,
        value: Expr,
    },
    ListRemove {
        list: Expr,
        value: Option<Expr>,
        index: Option<Expr>,
    },
    ListSort(Expr),
    ListReverse(Expr),
    ListShuffle(Expr),

    WriteFile {
        content: Expr,
        filename: Expr,
    },

    DrawCircle {
        x: Expr,
        y: Expr,
        size: Expr,
        color: Expr,
    },
    DrawRectangle {
        x1: Expr,
        y1: Expr,
        x2: Expr,
        y2: Expr,
        color: Expr,
    },
    DrawLine {
        x1: Expr,
        y1: Expr,
        x2: Expr,
        y2: Expr,
        color: Expr,
    },
    DrawText {
        text: Expr,
        x: Expr,
        y: Expr,
        size: Expr,
        color: Expr,
    },
    WhenMouseClicks {
        canvas: Expr,
        body: Vec<Stmt>,
    },

    Wait(Expr),
    After {
        seconds: Expr,
        body: Vec<Stmt>,
    },
    Every {
        seconds: Expr,
        body: Vec<Stmt>,
    },

    Use(String),
    Install(String),
    UsePython {
        module: String,
        alias: String,
    },

    Server {
        port: Expr,
        handlers: Vec<ServerHandler>,
    },
    Job {
        name: String,
        seconds: Expr,
        body: Vec<Stmt>,
    },
    StopJob(String),
    Cron {
        schedule: String,
        body: Vec<Stmt>,
    },
}
