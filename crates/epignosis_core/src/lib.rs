pub mod domain;
pub mod ports;

pub use domain::{
    BlogPost, ChatMessage, ChatSender, DailyScripture, GroundingChunk, ProgressPatch, Quiz,
    QuizLevel, QuizOption, QuizQuestion, RetrievedContext, StudyTopic, StudyTopicSection, User,
    UserData, UserQuizProgress, WebSource,
};
pub use ports::{
    ChatModelService, ContentCatalog, MessageStreams, PortError, PortResult, SourcesStream,
    TextStream, UserStore,
};
